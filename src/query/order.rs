use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
    /// Sort numeric-looking values by number first so "2" sorts before "10".
    pub numeric_first: bool,
}

/// Resolve `<field>_<asc|desc>` against the orderable whitelist.
///
/// Anything that does not match yields `None`; ordering is dropped, never an error.
/// The first whitelist entry that prefixes the parameter wins.
pub fn resolve_order(param: Option<&str>, orderable: &[&str]) -> Option<OrderBy> {
    let param = param?;
    let parts: Vec<&str> = param.split('_').collect();
    if parts.len() < 2 {
        return None;
    }
    let direction = match parts[parts.len() - 1] {
        "asc" => Direction::Asc,
        "desc" => Direction::Desc,
        _ => return None,
    };
    let field = orderable.iter().find(|f| param.starts_with(**f))?;
    Some(OrderBy {
        field: (*field).to_string(),
        direction,
        numeric_first: !(field.contains("date") || field.contains("id_")),
    })
}
