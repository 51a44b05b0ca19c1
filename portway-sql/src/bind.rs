//! Binds an ordered [`Literal`] list onto an `sqlx::any` query. Unlike
//! diesel's `sql_query().bind::<Type,_>()` chain (see `portway-auth` for
//! that style against the fixed token schema), `sqlx::Query::bind` returns
//! `Self` regardless of the bound type, which is what makes binding a
//! runtime-length, heterogeneously-typed parameter list possible without
//! type-erasing the query by hand.

use portway_odata::Literal;
use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;

pub fn bind_all<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    params: &'q [Literal],
) -> Query<'q, Any, AnyArguments<'q>> {
    for literal in params {
        query = bind_one(query, literal);
    }
    query
}

fn bind_one<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    literal: &'q Literal,
) -> Query<'q, Any, AnyArguments<'q>> {
    match literal {
        Literal::String(s) => query.bind(s.as_str()),
        Literal::Number(n) => query.bind(*n),
        Literal::DateTime(s) => query.bind(s.as_str()),
        Literal::Guid(s) => query.bind(s.as_str()),
        Literal::Bool(b) => query.bind(*b),
        Literal::Null => query.bind(Option::<String>::None),
    }
}
