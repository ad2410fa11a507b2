mod catalog;
mod settings;

pub use catalog::{CompletionCriterion, Section, SectionCatalog};
pub use settings::{
    CliConfig, CommandConfig, KnowledgeConfig, OutputConfig, SpecialistsConfig, WorkflowConfig,
};
