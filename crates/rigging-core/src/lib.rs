//! Rigging Core - group-vars compilation with secret decryption
//!
//! This crate provides the configuration side of Rigging:
//! - `Values`: Configuration tree with deep merge support
//! - `ValueFile`: One group-vars file, with EJSON secrets opened
//! - `compile`: Priority-ordered merge of group-vars into one tree
//! - `Evaluator`: Contract for resolving references inside a tree
//! - `Playbook`: Plays resolved against an entry's values

pub mod context;
pub mod ejson;
pub mod error;
pub mod evaluate;
pub mod groupvars;
pub mod playbook;
pub mod value_file;
pub mod values;

pub use context::{EnvDefaults, SecretContext};
pub use error::{CoreError, Result};
pub use evaluate::{EvalError, EvalScope, Evaluator, PassthroughEvaluator};
pub use groupvars::{CompileOptions, Compiled, DecryptWarning, compile};
pub use playbook::{Play, Playbook, Repo};
pub use value_file::{Decryption, ValueFile};
pub use values::Values;
