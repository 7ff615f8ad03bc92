//! Name mangling: maps a source identifier and its declaring file to a
//! stable, globally unique name for the emitted module.

/// Mangle `name` declared in `source_file` relative to `entry_file`.
///
/// Declarations in the entry file (or the synthetic prelude file) keep
/// their bare name; everything else is prefixed with a sanitized relative
/// path so identically named declarations in different files never
/// collide.
#[must_use]
pub fn mangle(name: &str, source_file: &str, entry_file: &str) -> String {
    if source_file == entry_file || source_file == PRELUDE_FILE {
        return name.to_string();
    }
    let relative = relative_path(entry_file, source_file);
    let mut mangled = sanitize(&relative);
    mangled.push('/');
    mangled.push_str(name);
    mangled
}

/// The synthetic file name used for the primitive-keyword prelude (stands
/// in for the fixed auxiliary declaration file concept).
pub const PRELUDE_FILE: &str = "<prelude>";

fn relative_path(entry_file: &str, source_file: &str) -> String {
    let entry_dir = entry_file.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    if let Some(stripped) = source_file.strip_prefix(entry_dir) {
        stripped.trim_start_matches('/').to_string()
    } else {
        source_file.to_string()
    }
}

fn sanitize(path: &str) -> String {
    path.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '/' | '\\' | '$') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_file_declarations_keep_bare_names() {
        assert_eq!(mangle("add", "module.wat-src", "module.wat-src"), "add");
    }

    #[test]
    fn prelude_declarations_keep_bare_names() {
        assert_eq!(mangle("int", PRELUDE_FILE, "module.wat-src"), "int");
    }

    #[test]
    fn imported_file_declarations_are_prefixed() {
        let mangled = mangle("helper", "lib/util.wat-src", "module.wat-src");
        assert_eq!(mangled, "lib/util.wat-src/helper");
    }

    #[test]
    fn distinct_files_never_collide_on_the_same_name() {
        let a = mangle("x", "a/mod.wat-src", "module.wat-src");
        let b = mangle("x", "b/mod.wat-src", "module.wat-src");
        assert_ne!(a, b);
    }

    #[test]
    fn mangling_is_injective_across_many_file_name_pairs() {
        let pairs = [
            ("x", "a/mod.wat-src"),
            ("y", "a/mod.wat-src"),
            ("x", "b/mod.wat-src"),
            ("x", "module.wat-src"),
            ("x", "a/b/mod.wat-src"),
        ];
        let mangled: Vec<String> = pairs.iter().map(|(name, file)| mangle(name, file, "module.wat-src")).collect();
        for i in 0..mangled.len() {
            for j in 0..mangled.len() {
                if i != j {
                    assert_ne!(mangled[i], mangled[j], "{:?} and {:?} collided", pairs[i], pairs[j]);
                }
            }
        }
    }
}
