//! SQLite schema for the moodboard share database.

pub(crate) struct Table {
    pub name: &'static str,
    pub schema: &'static str,
    pub indices: &'static [&'static str],
}

const MOODBOARDS_TABLE_V_0: Table = Table {
    name: "moodboards",
    schema: "CREATE TABLE moodboards (\
             id TEXT NOT NULL UNIQUE, \
             original_mood TEXT NOT NULL, \
             poetic_caption TEXT NOT NULL, \
             playlist TEXT NOT NULL, \
             images TEXT NOT NULL, \
             view_count INTEGER NOT NULL DEFAULT 0, \
             created_at INTEGER DEFAULT (cast(strftime('%s','now') as int)), \
             PRIMARY KEY (id));",
    indices: &[],
};

pub(crate) struct VersionedSchema {
    pub version: u32,
    pub tables: &'static [Table],
}

pub(crate) const MOODBOARD_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[MOODBOARDS_TABLE_V_0],
}];
