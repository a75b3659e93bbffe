pub mod mutation;
pub mod objects;
pub mod query;

#[cfg(test)]
mod tests;

use async_graphql::{EmptySubscription, Schema};

use crate::auth::AppState;

pub use mutation::Mutation;
pub use query::Query;

pub type MixtapeSchema = Schema<Query, Mutation, EmptySubscription>;

pub fn build_schema(state: AppState) -> MixtapeSchema {
    Schema::build(Query, Mutation, EmptySubscription)
        .data(state)
        .finish()
}
