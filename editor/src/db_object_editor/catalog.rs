//! Catalog, schema and character set queries used by the property sheets.

use workbench_core::grt::GrtObjectRef;

use super::DbObjectEditor;
use crate::base_editor::ObjectEditor;

/// Placeholder entry that lets the user type a table name.
pub const SPECIFY_MANUALLY: &str = "Specify Manually...";
pub const DEFAULT_CHARSET: &str = "Default Charset";
pub const DEFAULT_COLLATION: &str = "Default Collation";

const CHARSET_SEPARATOR: &str = " - ";

impl DbObjectEditor {
    /// Nearest catalog above (or at) the edited object.
    pub fn catalog(&self) -> Option<GrtObjectRef> {
        self.object().find_self_or_ancestor("db.Catalog")
    }

    /// Nearest schema above (or at) the edited object.
    pub fn schema(&self) -> Option<GrtObjectRef> {
        self.object().find_self_or_ancestor("db.Schema")
    }

    pub fn schema_name(&self) -> String {
        self.schema().map(|s| s.name()).unwrap_or_default()
    }

    pub fn schema_with_name(&self, name: &str) -> Option<GrtObjectRef> {
        find_named(&self.catalog()?.object_list("schemata"), name)
    }

    /// Schemas the object may be moved to. A live object stays in its own.
    pub fn all_schema_names(&self) -> Vec<String> {
        if self.is_editing_live_object() {
            return self.schema().map(|s| vec![s.name()]).unwrap_or_default();
        }
        self.catalog()
            .map(|catalog| {
                catalog
                    .object_list("schemata")
                    .iter()
                    .map(|s| s.name())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Qualified names of the tables in the object's schema, sorted.
    pub fn schema_table_names(&self) -> Vec<String> {
        let mut names = self
            .schema()
            .map(|schema| qualified_table_names(&schema))
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Qualified names of every table in the catalog followed by
    /// [`SPECIFY_MANUALLY`].
    pub fn all_table_names(&self) -> Vec<String> {
        if self.is_editing_live_object() {
            self.create_live_table_stubs();
        }
        let mut names = self.schema_table_names();
        let own = self.schema();
        if let Some(catalog) = self.catalog() {
            for schema in catalog.object_list("schemata") {
                if own.as_ref().is_some_and(|own| own.same_object(&schema)) {
                    continue;
                }
                names.extend(qualified_table_names(&schema));
            }
        }
        names.sort();
        names.push(SPECIFY_MANUALLY.to_owned());
        names
    }

    /// Column names of the table called `table`, which may be qualified
    /// with a schema. Unqualified names are looked up in the own schema.
    pub fn table_column_names(&self, table: &str) -> Vec<String> {
        let parts = split_qualified_identifier(table);
        let (schema, table) = match parts.as_slice() {
            [table] => (self.schema(), table),
            [schema, table] => (self.schema_with_name(schema), table),
            _ => return Vec::new(),
        };
        schema
            .and_then(|schema| find_named(&schema.object_list("tables"), table))
            .map(|table| {
                table
                    .object_list("columns")
                    .iter()
                    .map(|c| c.name())
                    .collect()
            })
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Character sets
    // -----------------------------------------------------------------------

    fn charsets(&self) -> Vec<GrtObjectRef> {
        self.catalog()
            .map(|catalog| catalog.object_list("characterSets"))
            .unwrap_or_default()
    }

    /// Known character sets plus [`DEFAULT_CHARSET`], sorted.
    pub fn charset_list(&self) -> Vec<String> {
        let mut list: Vec<String> = self.charsets().iter().map(|cs| cs.name()).collect();
        list.push(DEFAULT_CHARSET.to_owned());
        list.sort();
        list
    }

    /// Collations of `charset` plus [`DEFAULT_COLLATION`], sorted.
    pub fn charset_collation_list(&self, charset: &str) -> Vec<String> {
        let mut list = find_named(&self.charsets(), charset)
            .map(|cs| string_list(&cs, "collations"))
            .unwrap_or_default();
        list.push(DEFAULT_COLLATION.to_owned());
        list.sort();
        list
    }

    /// Every charset in its default form followed by each of its collations,
    /// formatted with [`format_charset_collation`].
    pub fn all_charset_collations(&self) -> Vec<String> {
        let mut list = Vec::new();
        for charset in self.charsets() {
            let name = charset.name();
            list.push(format_charset_collation(&name, ""));
            for collation in string_list(&charset, "collations") {
                list.push(format_charset_collation(&name, &collation));
            }
        }
        list
    }
}

/// Display form of a charset/collation pair as used in combo boxes.
///
/// An empty collation stands for the charset's default one.
pub fn format_charset_collation(charset: &str, collation: &str) -> String {
    match (charset.is_empty(), collation.is_empty()) {
        (true, true) => CHARSET_SEPARATOR.to_owned(),
        (false, true) => format!("{charset}{CHARSET_SEPARATOR}{DEFAULT_COLLATION}"),
        _ => format!("{charset}{CHARSET_SEPARATOR}{collation}"),
    }
}

/// Inverse of [`format_charset_collation`]. The default collation comes
/// back as an empty string.
pub fn parse_charset_collation(value: &str) -> Option<(String, String)> {
    let (charset, collation) = value.split_once(CHARSET_SEPARATOR)?;
    let collation = if collation == DEFAULT_COLLATION {
        ""
    } else {
        collation
    };
    Some((charset.to_owned(), collation.to_owned()))
}

/// Splits `` `schema`.`table` `` style identifiers into their parts.
///
/// Back-quoted parts may contain dots; a doubled back-quote inside quotes
/// is a literal one.
pub fn split_qualified_identifier(identifier: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = identifier.trim().chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '`' if quoted && chars.peek() == Some(&'`') => {
                chars.next();
                current.push('`');
            }
            '`' => quoted = !quoted,
            '.' if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if !current.is_empty() || !parts.is_empty() {
        parts.push(current);
    }
    parts
}

fn find_named(objects: &[GrtObjectRef], name: &str) -> Option<GrtObjectRef> {
    objects.iter().find(|o| o.name() == name).cloned()
}

fn qualified_table_names(schema: &GrtObjectRef) -> Vec<String> {
    let schema_name = schema.name();
    schema
        .object_list("tables")
        .iter()
        .map(|table| format!("`{schema_name}`.`{}`", table.name()))
        .collect()
}

fn string_list(object: &GrtObjectRef, member: &str) -> Vec<String> {
    object
        .member(member)
        .as_list()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_charset_collation_variants() {
        assert_eq!(format_charset_collation("", ""), " - ");
        assert_eq!(
            format_charset_collation("utf8mb4", ""),
            "utf8mb4 - Default Collation"
        );
        assert_eq!(
            format_charset_collation("utf8mb4", "utf8mb4_bin"),
            "utf8mb4 - utf8mb4_bin"
        );
    }

    #[test]
    fn parse_charset_collation_maps_default() {
        assert_eq!(
            parse_charset_collation("latin1 - Default Collation"),
            Some(("latin1".to_owned(), String::new()))
        );
        assert_eq!(
            parse_charset_collation("latin1 - latin1_swedish_ci"),
            Some(("latin1".to_owned(), "latin1_swedish_ci".to_owned()))
        );
        assert_eq!(parse_charset_collation("latin1"), None);
    }

    #[test]
    fn split_plain_and_quoted_identifiers() {
        assert_eq!(split_qualified_identifier("t1"), vec!["t1"]);
        assert_eq!(split_qualified_identifier("`s`.`t`"), vec!["s", "t"]);
        assert_eq!(split_qualified_identifier("s.t"), vec!["s", "t"]);
        assert_eq!(split_qualified_identifier("`a.b`.`c``d`"), vec!["a.b", "c`d"]);
        assert!(split_qualified_identifier("  ").is_empty());
    }
}
