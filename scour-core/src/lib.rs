pub mod error;

pub mod config;

pub mod logging;

pub mod fs {
    pub mod classifier;

    pub mod content;
    pub use content::{ContentSearcher, EngineSelector};

    pub mod entry;
    pub use entry::{Entry, ObjectType};

    pub mod lister;

    pub mod matcher;
    pub use matcher::NameMatcher;

    pub mod search;
}

pub mod system;
pub use system::{Event, Operation, Progress, Request, Response, SearchCoordinator, System};

pub mod util {
    pub mod humanize;
}

pub use error::AppError;

pub use config::Config;

pub use fs::{Entry, EngineSelector, ObjectType};
