use std::path::{Path, PathBuf};

use anyhow::Context as _;

/// Stand-in for weasyprint: logs its arguments and copies the HTML input to the output.
pub const FAKE_WEASYPRINT: &str = r#"#!/bin/sh
printf '%s\n' "$@" > "$(dirname "$0")/engine-args.txt"
for arg in "$@"; do
  input="$output"
  output="$arg"
done
cp "$input" "$output"
"#;

pub const FAILING_WEASYPRINT: &str = "#!/bin/sh\necho 'boom: layout exploded' >&2\nexit 3\n";

/// Stand-in for mmdc: writes an SVG that embeds the first line of the diagram.
pub const FAKE_MMDC: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    -i) input="$2"; shift 2 ;;
    -o) output="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf '<svg xmlns="http://www.w3.org/2000/svg"><text>%s</text></svg>' "$(head -n 1 "$input")" > "$output"
"#;

#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> anyhow::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt as _;

    let path = dir.join(name);
    std::fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    let mut perms = std::fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms)?;
    Ok(path)
}

pub fn write_file(root: &Path, rel: &str, contents: &str) -> anyhow::Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
