use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Writes `data` next to `path` under a temporary name, syncs it, then renames it into place.
/// 先寫入同目錄的暫存檔並同步，再以 rename 取代目標檔案。
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}
