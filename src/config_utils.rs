use std::path::Path;
use std::path::PathBuf;

use yaml_rust::Yaml;


pub fn str_to_absolute_path(path_str: &str, default_base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        return path;
    } else {
        return [default_base_dir, Path::new(&path)].iter().collect();
    }
}

/// The number of worker threads to use when none is configured: as many as rayon's global pool.
pub fn default_worker_count() -> usize {
    rayon::current_num_threads()
}

/// Reads a non-negative integer setting, if it's present.
pub fn get_yaml_usize(yaml_cfg: &Yaml, key: &str) -> Option<usize> {
    match yaml_cfg[key].as_i64() {
        Some(value) if value >= 0 => Some(value as usize),
        Some(value) => {
            log::warn!("Ignoring negative value {} for {}", value, key);
            None
        }
        None => None,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust::YamlLoader;

    #[test]
    fn test_absolute_path() {
        let base = Path::new("/data/cfgs");
        assert_eq!(str_to_absolute_path("nodes.csv", base), PathBuf::from("/data/cfgs/nodes.csv"));
        assert_eq!(str_to_absolute_path("/tmp/nodes.csv", base), PathBuf::from("/tmp/nodes.csv"));
    }

    #[test]
    fn test_default_worker_count() {
        assert!(default_worker_count() >= 1);
        assert_eq!(default_worker_count(), rayon::current_num_threads());
    }

    #[test]
    fn test_get_yaml_usize() {
        let docs = YamlLoader::load_from_str("a: 4\nb: -2\nc: x").unwrap();
        let yaml_cfg = &docs[0];
        assert_eq!(get_yaml_usize(yaml_cfg, "a"), Some(4));
        assert_eq!(get_yaml_usize(yaml_cfg, "b"), None);
        assert_eq!(get_yaml_usize(yaml_cfg, "c"), None);
        assert_eq!(get_yaml_usize(yaml_cfg, "missing"), None);
    }
}
