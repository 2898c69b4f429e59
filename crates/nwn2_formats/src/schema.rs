//! Typed row schemas for well-known tables.
//!
//! A [`TableSchema`] names the columns a table must carry and decodes one row into a
//! plain struct whose optional fields carry explicit defaults. Decoding happens once,
//! when [`TwoDaTable::rows_as`](crate::TwoDaTable::rows_as) is called, so consumers
//! never probe cells with ad-hoc fallbacks.

use crate::twoda::{parse_int, TwoDaTable};
use serde::{Deserialize, Serialize};

/// A typed view over the rows of a specific table.
pub trait TableSchema: Sized {
    /// Resource name of the table, without extension.
    const TABLE_NAME: &'static str;

    /// Columns that must be present for the table to be usable.
    const REQUIRED_COLUMNS: &'static [&'static str];

    /// Decode one row. Missing or empty optional cells map to defaults.
    fn from_row(row: &RowView<'_>) -> Self;
}

/// Borrowed access to one table row.
pub struct RowView<'a> {
    table: &'a TwoDaTable,
    row: usize,
}

impl<'a> RowView<'a> {
    pub(crate) fn new(table: &'a TwoDaTable, row: usize) -> Self {
        Self { table, row }
    }

    pub fn index(&self) -> usize {
        self.row
    }

    pub fn str(&self, column: &str) -> Option<&'a str> {
        self.table.get(self.row, column)
    }

    pub fn string(&self, column: &str) -> String {
        self.str(column).unwrap_or_default().to_string()
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        parse_int(self.str(column)?)
    }

    pub fn int_or(&self, column: &str, default: i64) -> i64 {
        self.int(column).unwrap_or(default)
    }

    /// A string reference column. Negative or empty cells are `None`.
    pub fn strref(&self, column: &str) -> Option<u32> {
        self.int(column).and_then(|v| u32::try_from(v).ok())
    }

    /// `1`/`0` flag columns. Anything non-zero is `true`.
    pub fn flag(&self, column: &str) -> bool {
        self.int(column).is_some_and(|v| v != 0)
    }
}

/// A row of `classes.2da`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassRow {
    pub id: usize,
    pub label: String,
    pub name: Option<u32>,
    pub description: Option<u32>,
    pub hit_die: u8,
    pub skill_point_base: u8,
    pub attack_bonus_table: String,
    pub feats_table: String,
    pub player_class: bool,
    pub max_level: u8,
}

impl TableSchema for ClassRow {
    const TABLE_NAME: &'static str = "classes";
    const REQUIRED_COLUMNS: &'static [&'static str] = &["Label"];

    fn from_row(row: &RowView<'_>) -> Self {
        Self {
            id: row.index(),
            label: row.string("Label"),
            name: row.strref("Name"),
            description: row.strref("Description"),
            hit_die: row.int_or("HitDie", 0).clamp(0, u8::MAX as i64) as u8,
            skill_point_base: row.int_or("SkillPointBase", 0).clamp(0, u8::MAX as i64) as u8,
            attack_bonus_table: row.string("AttackBonusTable"),
            feats_table: row.string("FeatsTable"),
            player_class: row.flag("PlayerClass"),
            max_level: row.int_or("MaxLevel", 0).clamp(0, u8::MAX as i64) as u8,
        }
    }
}

/// A row of `feat.2da`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatRow {
    pub id: usize,
    pub label: String,
    pub name: Option<u32>,
    pub description: Option<u32>,
    pub icon: String,
    pub min_level: u8,
    pub prereq_feat1: Option<u32>,
    pub prereq_feat2: Option<u32>,
    pub all_classes_can_use: bool,
    pub removed: bool,
}

impl TableSchema for FeatRow {
    const TABLE_NAME: &'static str = "feat";
    const REQUIRED_COLUMNS: &'static [&'static str] = &["LABEL"];

    fn from_row(row: &RowView<'_>) -> Self {
        Self {
            id: row.index(),
            label: row.string("LABEL"),
            name: row.strref("FEAT"),
            description: row.strref("DESCRIPTION"),
            icon: row.string("ICON"),
            min_level: row.int_or("MINLEVEL", 0).clamp(0, u8::MAX as i64) as u8,
            prereq_feat1: row.strref("PREREQFEAT1"),
            prereq_feat2: row.strref("PREREQFEAT2"),
            all_classes_can_use: row.flag("ALLCLASSESCANUSE"),
            removed: row.flag("REMOVED"),
        }
    }
}

/// A row of `racialtypes.2da`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RaceRow {
    pub id: usize,
    pub label: String,
    pub name: Option<u32>,
    pub str_adjust: i8,
    pub dex_adjust: i8,
    pub con_adjust: i8,
    pub int_adjust: i8,
    pub wis_adjust: i8,
    pub cha_adjust: i8,
    pub player_race: bool,
}

impl TableSchema for RaceRow {
    const TABLE_NAME: &'static str = "racialtypes";
    const REQUIRED_COLUMNS: &'static [&'static str] = &["Label"];

    fn from_row(row: &RowView<'_>) -> Self {
        let adjust = |column: &str| row.int_or(column, 0).clamp(i8::MIN as i64, i8::MAX as i64) as i8;
        Self {
            id: row.index(),
            label: row.string("Label"),
            name: row.strref("Name"),
            str_adjust: adjust("StrAdjust"),
            dex_adjust: adjust("DexAdjust"),
            con_adjust: adjust("ConAdjust"),
            int_adjust: adjust("IntAdjust"),
            wis_adjust: adjust("WisAdjust"),
            cha_adjust: adjust("ChaAdjust"),
            player_race: row.flag("PlayerRace"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FormatError;

    #[test]
    fn test_class_rows_with_defaults() {
        let text = "2DA V2.0\n\nLabel Name HitDie PlayerClass\n0 Barbarian 5213 12 1\n1 Cat **** **** 0\n";
        let table = TwoDaTable::parse(text.as_bytes()).unwrap();
        let rows: Vec<ClassRow> = table.rows_as().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "Barbarian");
        assert_eq!(rows[0].name, Some(5213));
        assert_eq!(rows[0].hit_die, 12);
        assert!(rows[0].player_class);
        assert_eq!(rows[1].name, None);
        assert_eq!(rows[1].hit_die, 0);
        assert!(!rows[1].player_class);
        assert_eq!(rows[1].feats_table, "");
    }

    #[test]
    fn test_missing_required_column() {
        let table = TwoDaTable::parse(b"2DA V2.0\n\nName\n0 12\n").unwrap();
        let err = table.rows_as::<FeatRow>().unwrap_err();
        assert!(matches!(
            err,
            FormatError::MissingColumn { schema: "feat", column: "LABEL" }
        ));
    }

    #[test]
    fn test_race_adjust_negative() {
        let text = "2DA V2.0\n\nLabel StrAdjust ConAdjust\n0 Dwarf 0 2\n1 Elf **** -2\n";
        let table = TwoDaTable::parse(text.as_bytes()).unwrap();
        let rows: Vec<RaceRow> = table.rows_as().unwrap();
        assert_eq!(rows[0].con_adjust, 2);
        assert_eq!(rows[1].con_adjust, -2);
        assert_eq!(rows[1].str_adjust, 0);
    }
}
