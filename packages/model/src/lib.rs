//! # Scribe Model
//!
//! Document tree model for the Scribe editing core.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: keys, nodes, snapshots, registry     │
//! │  - Process-unique node keys                 │
//! │  - Tagged-variant node catalogue            │
//! │  - Immutable copy-on-write snapshots        │
//! │  - Reference-counted type registry          │
//! │  - Portable (serde) snapshot form           │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The editor crate layers transactions and scheduling on top of this
//! model; the reconciler crate diffs two snapshots against a view host.

mod error;
mod key;
mod node;
mod portable;
mod registry;
mod state;

pub use error::{ModelError, RegistryError};
pub use key::{NodeKey, ROOT_KEY};
pub use node::{Node, NodeBody};
pub use portable::{
    from_portable, to_portable, PortableBody, PortableNode, PortablePoint, PortableSelection,
    PortableState,
};
pub use registry::{NodeRegistry, NodeShape, NodeSpec, RegistrationToken};
pub use state::{EditorState, Point, Selection};
