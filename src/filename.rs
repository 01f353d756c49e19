use std::path::{Path, PathBuf};

/// Path of table file `number` inside database directory `dbname`.
pub fn table_file_name(dbname: &Path, number: u64) -> PathBuf {
    dbname.join(format!("{number:06}.ldb"))
}
