mod condition;
mod description;
mod error;
mod expr;
pub mod filter;
mod translate;

pub use condition::{Condition, ConditionSet, Operator};
pub use description::{QueryDescription, QueryOp, ScalarOp};
pub use error::{FilterError, QueryError, Result};
pub use expr::{field, lit, one_of, CompareOp, Expr, IntoOperand, Method};
pub use filter::FilterExpr;
pub use translate::{translate, Reduction, TranslationResult};
