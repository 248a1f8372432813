/// Parsed serialization tag of a record field.
///
/// Tag syntax is `name[,option]*`:
/// - `"f1"` renames the field to `f1`
/// - `"f1,omitempty"` also omits it when zero
/// - `",inline"` promotes the fields of a nested record into the parent
/// - `"-"` skips the field entirely
///
/// Unknown options are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldTag<'a> {
    /// Output name; `None` means "use the declared field name".
    pub name: Option<&'a str>,
    pub omit_empty: bool,
    pub inline: bool,
    pub skip: bool,
}

impl<'a> FieldTag<'a> {
    pub fn parse(tag: &'a str) -> Self {
        if tag == "-" {
            return Self {
                skip: true,
                ..Self::default()
            };
        }

        let mut parts = tag.split(',');
        let name = parts.next().filter(|name| !name.is_empty());
        let mut parsed = Self {
            name,
            ..Self::default()
        };
        for option in parts {
            match option.trim() {
                "omitempty" => parsed.omit_empty = true,
                "inline" => parsed.inline = true,
                _ => {}
            }
        }
        parsed
    }

    /// Parse an optional tag; a missing tag behaves like an empty one.
    pub fn parse_opt(tag: Option<&'a str>) -> Self {
        tag.map(Self::parse).unwrap_or_default()
    }

    /// Output name, falling back to the declared field name.
    pub fn output_name(&self, declared: &'a str) -> &'a str {
        self.name.unwrap_or(declared)
    }
}
