use std::fmt;

/// Operator keys accepted inside a single-key field object, e.g. `{"qty": {"$gte": 6}}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    NotBetween,
    Like,
    NotLike,
    In,
    NotIn,
}

impl Operator {
    pub fn parse(key: &str) -> Option<Self> {
        Some(match key {
            "$eq" => Operator::Eq,
            "$ne" => Operator::Ne,
            "$gt" => Operator::Gt,
            "$gte" => Operator::Gte,
            "$lt" => Operator::Lt,
            "$lte" => Operator::Lte,
            "$between" => Operator::Between,
            "$not_between" => Operator::NotBetween,
            "$like" => Operator::Like,
            "$not_like" => Operator::NotLike,
            "$in" => Operator::In,
            "$not_in" => Operator::NotIn,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Between => "$between",
            Operator::NotBetween => "$not_between",
            Operator::Like => "$like",
            Operator::NotLike => "$not_like",
            Operator::In => "$in",
            Operator::NotIn => "$not_in",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
