use std::fs;
use std::io::Write;
use std::path::Path;

/// 生成 `MIGRATIONS: &[(&str, &str)]`，供 `serverstats migrate` 使用。
/// 只收录 `NNN_name.sql` 形式的文件，`000_` 开头的保留给手工脚本。
fn main() {
    let migrations_dir = Path::new("migrations");
    let out_dir = std::env::var("OUT_DIR").expect("cargo 未设置 OUT_DIR");
    let dest_path = Path::new(&out_dir).join("migrations.rs");

    println!("cargo:rerun-if-changed=migrations/");

    let mut names: Vec<String> = Vec::new();
    if migrations_dir.exists() {
        names = fs::read_dir(migrations_dir)
            .expect("无法读取 migrations 目录")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| is_migration(name))
            .collect();
        names.sort();
    }

    let entries: Vec<String> = names
        .iter()
        .map(|file_name| {
            format!(
                "    (\"{}\", include_str!(concat!(env!(\"CARGO_MANIFEST_DIR\"), \"/migrations/{}\")))",
                file_name.trim_end_matches(".sql"),
                file_name
            )
        })
        .collect();

    let mut f = fs::File::create(&dest_path).expect("无法创建 migrations.rs");
    writeln!(
        f,
        "/// 构建时从 migrations/ 目录生成\n\
         pub const MIGRATIONS: &[(&str, &str)] = &[\n{}\n];",
        entries.join(",\n")
    )
    .expect("无法写入 migrations.rs");
}

fn is_migration(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".sql") else {
        return false;
    };
    let prefix: String = stem.chars().take_while(|c| c.is_ascii_digit()).collect();
    !prefix.is_empty() && prefix.chars().any(|c| c != '0') && stem[prefix.len()..].starts_with('_')
}
