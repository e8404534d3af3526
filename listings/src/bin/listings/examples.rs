use crate::commands::{collections, indexes, plan, search, seed};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "plan",
            groups: plan::EXAMPLES,
        },
        CommandExample {
            name: "search",
            groups: search::EXAMPLES,
        },
        CommandExample {
            name: "seed",
            groups: seed::EXAMPLES,
        },
        CommandExample {
            name: "indexes",
            groups: indexes::EXAMPLES,
        },
        CommandExample {
            name: "collections",
            groups: collections::EXAMPLES,
        },
    ]
}
