//! Authorization kernel
//!
//! One resolver call per request produces a [`PermissionRecord`]; every
//! visibility filter, context switch, admin check and approval decision reads
//! from that record:
//! - `resolver`: role/membership rows -> effective capabilities
//! - `scope`: capabilities -> visible companies, departments, projects
//! - `context`: the user's active company/department/project
//! - `evaluator`: the per-tenant approval matrix
//! - `admin`: authority over role assignments and memberships

pub mod admin;
mod context;
mod evaluator;
mod record;
mod resolver;
pub mod scope;

pub use context::{switch_active_company, ActiveContext, ContextSelector};
pub use evaluator::{ApprovalEvaluator, MatrixEvaluator};
pub use record::PermissionRecord;
pub use resolver::{build_record, resolve, resolve_permissions, Resolution};
pub use scope::{visible_companies, visible_departments, visible_projects};
