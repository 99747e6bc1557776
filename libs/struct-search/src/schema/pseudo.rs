use crate::types::{DateTimeType, DecimalType, PageType, TextType, TypeKind, UserType};

/// Columns every schema reference offers without storing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoKind {
    PageId,
    Title,
    LastUpdate,
    LastEditor,
    LastSummary,
    RowId,
}

impl PseudoKind {
    pub const ALL: [PseudoKind; 6] = [
        Self::PageId,
        Self::Title,
        Self::LastUpdate,
        Self::LastEditor,
        Self::LastSummary,
        Self::RowId,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Self::PageId => "%pageid%",
            Self::Title => "%title%",
            Self::LastUpdate => "%lastupdate%",
            Self::LastEditor => "%lasteditor%",
            Self::LastSummary => "%lastsummary%",
            Self::RowId => "%rowid%",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.token().eq_ignore_ascii_case(token))
    }

    fn column_type(self) -> TypeKind {
        match self {
            Self::PageId => TypeKind::Page(PageType::default()),
            Self::Title => TypeKind::Page(PageType { usetitles: true }),
            Self::LastUpdate => TypeKind::DateTime(DateTimeType::default()),
            Self::LastEditor => TypeKind::User(UserType::default()),
            Self::LastSummary => TypeKind::Text(TextType::default()),
            Self::RowId => TypeKind::Decimal(DecimalType::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PseudoColumn {
    kind: PseudoKind,
    column_type: TypeKind,
}

impl PseudoColumn {
    pub fn new(kind: PseudoKind) -> Self {
        Self {
            kind,
            column_type: kind.column_type(),
        }
    }

    pub fn kind(&self) -> PseudoKind {
        self.kind
    }

    pub fn column_type(&self) -> &TypeKind {
        &self.column_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;

    #[test]
    fn tokens_round_trip_ignoring_case() {
        for kind in PseudoKind::ALL {
            assert_eq!(PseudoKind::from_token(kind.token()), Some(kind));
        }
        assert_eq!(PseudoKind::from_token("%PageID%"), Some(PseudoKind::PageId));
        assert_eq!(PseudoKind::from_token("pageid"), None);
    }

    #[test]
    fn each_pseudo_column_has_its_type() {
        let class = |k| PseudoColumn::new(k).column_type().class();
        assert_eq!(class(PseudoKind::PageId), "Page");
        assert_eq!(class(PseudoKind::Title), "Page");
        assert_eq!(class(PseudoKind::LastUpdate), "DateTime");
        assert_eq!(class(PseudoKind::LastEditor), "User");
        assert_eq!(class(PseudoKind::LastSummary), "Text");
        assert_eq!(class(PseudoKind::RowId), "Decimal");
    }
}
