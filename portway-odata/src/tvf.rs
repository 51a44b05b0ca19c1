//! Table-valued-function call compilation (`spec.md` §4.D, worked example
//! 5): `SELECT * FROM [schema].[fn](@p0, @p1, …)` with positional
//! parameters in descriptor order.

use crate::ast::Literal;
use crate::error::ODataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Int,
    BigInt,
    Float,
    Bit,
    NVarChar,
    DateTime,
    Uniqueidentifier,
}

impl SqlType {
    pub fn parse(name: &str) -> Option<SqlType> {
        match name.to_ascii_lowercase().as_str() {
            "int" => Some(SqlType::Int),
            "bigint" => Some(SqlType::BigInt),
            "float" => Some(SqlType::Float),
            "bit" => Some(SqlType::Bit),
            "nvarchar" | "varchar" | "string" => Some(SqlType::NVarChar),
            "datetime" => Some(SqlType::DateTime),
            "uniqueidentifier" | "guid" => Some(SqlType::Uniqueidentifier),
            _ => None,
        }
    }

    fn coerce(self, raw: &str) -> Result<Literal, ODataError> {
        match self {
            SqlType::Int | SqlType::BigInt => raw
                .parse::<f64>()
                .map(Literal::Number)
                .map_err(|_| ODataError::FilterSyntax(format!("`{raw}` is not an integer"))),
            SqlType::Float => raw
                .parse::<f64>()
                .map(Literal::Number)
                .map_err(|_| ODataError::FilterSyntax(format!("`{raw}` is not a number"))),
            SqlType::Bit => match raw {
                "0" | "false" => Ok(Literal::Bool(false)),
                "1" | "true" => Ok(Literal::Bool(true)),
                _ => Err(ODataError::FilterSyntax(format!("`{raw}` is not a bit"))),
            },
            SqlType::NVarChar => Ok(Literal::String(raw.to_owned())),
            SqlType::DateTime => Ok(Literal::DateTime(raw.to_owned())),
            SqlType::Uniqueidentifier => Ok(Literal::Guid(raw.to_owned())),
        }
    }
}

/// One resolved call-site value for a declared TVF/procedure parameter.
pub enum ParamValue {
    /// A value supplied by the caller (path segment, query string, header).
    Provided(String),
    /// No value supplied; the descriptor names a default.
    Defaulted,
    /// No value supplied and the descriptor has no default.
    Missing,
}

pub struct TvfParamSpec {
    pub name: String,
    pub sql_type: String,
    pub required: bool,
    /// The descriptor's literal `Default` string, if any. The literal text
    /// `DEFAULT` means "let the database apply its own default"; anything
    /// else is coerced and bound as an ordinary parameter.
    pub default: Option<String>,
}

pub struct CompiledCall {
    pub sql: String,
    pub params: Vec<Literal>,
}

/// Builds `SELECT * FROM [schema].[object](@p0, DEFAULT, …)` for a TVF, or
/// `EXEC [schema].[object] @p0, …` for a stored procedure, in descriptor
/// parameter order.
pub fn compile_call(
    schema: &str,
    object: &str,
    as_tvf: bool,
    specs: &[TvfParamSpec],
    values: &[ParamValue],
) -> Result<CompiledCall, ODataError> {
    assert_eq!(specs.len(), values.len(), "specs and values must align 1:1");

    let mut params = Vec::new();
    let mut positional = Vec::with_capacity(specs.len());

    for (spec, value) in specs.iter().zip(values) {
        match value {
            ParamValue::Provided(raw) => {
                let sql_type = SqlType::parse(&spec.sql_type).ok_or_else(|| {
                    ODataError::FilterSyntax(format!("unknown sql_type `{}`", spec.sql_type))
                })?;
                let literal = sql_type.coerce(raw)?;
                positional.push(format!("@p{}", params.len()));
                params.push(literal);
            }
            ParamValue::Defaulted => {
                let default = spec.default.as_deref().unwrap_or_default();
                if default == "DEFAULT" {
                    positional.push("DEFAULT".to_owned());
                } else {
                    let sql_type = SqlType::parse(&spec.sql_type).ok_or_else(|| {
                        ODataError::FilterSyntax(format!("unknown sql_type `{}`", spec.sql_type))
                    })?;
                    let literal = sql_type.coerce(default)?;
                    positional.push(format!("@p{}", params.len()));
                    params.push(literal);
                }
            }
            ParamValue::Missing => {
                if spec.required {
                    return Err(ODataError::FilterSyntax(format!(
                        "missing required parameter `{}`",
                        spec.name
                    )));
                }
                positional.push("DEFAULT".to_owned());
            }
        }
    }

    let sql = if as_tvf {
        format!(
            "SELECT * FROM [{schema}].[{object}]({})",
            positional.join(", ")
        )
    } else {
        format!("EXEC [{schema}].[{object}] {}", positional.join(", "))
    };

    Ok(CompiledCall { sql, params })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_worked_example_5_tvf_call() {
        let specs = vec![
            TvfParamSpec {
                name: "position1".to_owned(),
                sql_type: "int".to_owned(),
                required: true,
                default: None,
            },
            TvfParamSpec {
                name: "year".to_owned(),
                sql_type: "int".to_owned(),
                required: true,
                default: None,
            },
        ];
        let values = vec![
            ParamValue::Provided("2024".to_owned()),
            ParamValue::Provided("2024".to_owned()),
        ];
        let call = compile_call("dbo", "fn_YearlySales", true, &specs, &values).unwrap();
        assert_eq!(call.sql, "SELECT * FROM [dbo].[fn_YearlySales](@p0, @p1)");
        assert_eq!(
            call.params,
            vec![Literal::Number(2024.0), Literal::Number(2024.0)]
        );
    }

    #[test]
    fn missing_required_parameter_fails() {
        let specs = vec![TvfParamSpec {
            name: "id".to_owned(),
            sql_type: "int".to_owned(),
            required: true,
            default: None,
        }];
        let values = vec![ParamValue::Missing];
        assert!(compile_call("dbo", "fn_X", true, &specs, &values).is_err());
    }

    #[test]
    fn defaulted_literal_default_emits_the_keyword_not_a_bound_parameter() {
        let specs = vec![TvfParamSpec {
            name: "flag".to_owned(),
            sql_type: "bit".to_owned(),
            required: false,
            default: Some("DEFAULT".to_owned()),
        }];
        let values = vec![ParamValue::Defaulted];
        let call = compile_call("dbo", "fn_X", true, &specs, &values).unwrap();
        assert_eq!(call.sql, "SELECT * FROM [dbo].[fn_X](DEFAULT)");
        assert!(call.params.is_empty());
    }
}
