// ABOUTME: Table migration module
// ABOUTME: Parses table references and moves table contents with COPY under an RLS bracket

pub mod row_security;
pub mod table_ref;
pub mod tables;

pub use row_security::with_row_security_suspended;
pub use table_ref::TableRef;
pub use tables::{extract_table, load_table, migrate_table, migrate_tables, TableTransfer};
