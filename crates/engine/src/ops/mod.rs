use sea_orm::DatabaseConnection;

use crate::{CodePolicy, RemainderPolicy, ResultEngine};

mod access;
mod accounts;
mod expenses;
mod members;
mod settlement;
mod trips;
mod virtual_members;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    remainder_policy: RemainderPolicy,
    code_policy: CodePolicy,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn remainder_policy(&self) -> RemainderPolicy {
        self.remainder_policy
    }

    pub fn code_policy(&self) -> CodePolicy {
        self.code_policy
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    remainder_policy: RemainderPolicy,
    code_policy: CodePolicy,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Who absorbs the minor units left over when an amount does not divide
    /// evenly among participants.
    pub fn remainder_policy(mut self, policy: RemainderPolicy) -> EngineBuilder {
        self.remainder_policy = policy;
        self
    }

    /// Length and retry bounds for trip join codes.
    pub fn code_policy(mut self, policy: CodePolicy) -> EngineBuilder {
        self.code_policy = policy;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        self.code_policy.validate()?;
        Ok(Engine {
            database: self.database,
            remainder_policy: self.remainder_policy,
            code_policy: self.code_policy,
        })
    }
}
