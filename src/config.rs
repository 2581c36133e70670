use std::env;

use crate::error::{DbError, DbResult};
use crate::storage::page::MAX_RECORDS_PER_PAGE;

/// Environment variable read by `TreeConfig::from_env`.
pub const ORDER_ENV_VAR: &str = "PAGETREE_ORDER";

pub const DEFAULT_ORDER: usize = 4;
pub const MIN_ORDER: usize = 3;

/// Largest order whose nodes, including the transient overfull state during a
/// split, still fit in one page.
pub const MAX_ORDER: usize = MAX_RECORDS_PER_PAGE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Maximum keys per node; a node splits when an insert would reach it.
    pub order: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig { order: DEFAULT_ORDER }
    }
}

impl TreeConfig {
    pub fn new(order: usize) -> DbResult<Self> {
        let config = TreeConfig { order };
        config.validate()?;
        Ok(config)
    }

    /// Default config, with `PAGETREE_ORDER` overriding the order when set.
    pub fn from_env() -> DbResult<Self> {
        match env::var(ORDER_ENV_VAR) {
            Ok(raw) => {
                let order = raw.trim().parse::<usize>().map_err(|_| {
                    DbError::InvalidConfig(format!("{}={:?} is not a number", ORDER_ENV_VAR, raw))
                })?;
                TreeConfig::new(order)
            }
            Err(env::VarError::NotPresent) => Ok(TreeConfig::default()),
            Err(e) => Err(DbError::InvalidConfig(format!("{}: {}", ORDER_ENV_VAR, e))),
        }
    }

    pub fn validate(&self) -> DbResult<()> {
        if !(MIN_ORDER..=MAX_ORDER).contains(&self.order) {
            return Err(DbError::InvalidOrder(self.order));
        }
        Ok(())
    }
}
