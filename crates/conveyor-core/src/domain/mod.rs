//! Domain model (task, wire codec, loop state, errors).

pub mod codec;
pub mod delivery;
pub mod errors;
pub mod generator;
pub mod state;
pub mod task;
pub mod task_type;

pub use self::delivery::{Delivery, DeliveryHandle};
pub use self::errors::{CodecError, PipelineError};
pub use self::generator::TaskGenerator;
pub use self::state::{DrainOutcome, LoopState, Role};
pub use self::task::Task;
pub use self::task_type::TaskKind;
