pub mod blif;
pub mod design;
pub mod error;
pub mod genlib;
pub mod graph;
pub mod mapper;
pub mod pass;
pub mod reintegrate;

// Re-exporting symbols and modules.
pub use design::{Design, Module};
pub use error::{Result, TechmapError};
pub use graph::{GateKind, Graph, LoopCut, Node, NodeId};
pub use mapper::{ExternalProcess, Linked, Mapper};
pub use pass::{ModuleReport, TechmapConfig, techmap_design, techmap_module};
