//! Scene selection

use crate::error::{SceneError, SelectionResult};
use coffin_core::{Scene, SceneCatalog, Settings};
use rand::seq::SliceRandom;
use rand::Rng;

/// Picks the scene to play on each trigger
#[derive(Debug, Clone)]
pub struct ScenePicker {
    random_mode: bool,
    /// Candidates for random selection
    pool: Vec<String>,
    /// Played when random mode is off
    fixed: String,
}

impl ScenePicker {
    /// Build a picker, checking every referenced scene exists
    pub fn from_settings(settings: &Settings, catalog: &SceneCatalog) -> SelectionResult<Self> {
        let pool: Vec<String> = match &settings.random_scene_list {
            Some(list) if !list.is_empty() => list.clone(),
            _ => catalog.names().map(String::from).collect(),
        };
        if let Some(missing) = pool.iter().find(|name| !catalog.contains(name)) {
            return Err(SceneError::UnknownScene(missing.clone()));
        }

        let fixed = match &settings.default_scene {
            Some(name) if catalog.contains(name) => name.clone(),
            Some(name) => return Err(SceneError::UnknownScene(name.clone())),
            None => catalog.names().next().ok_or(SceneError::EmptyPool)?.to_string(),
        };

        if pool.is_empty() {
            return Err(SceneError::EmptyPool);
        }

        Ok(Self {
            random_mode: settings.random_scene_mode,
            pool,
            fixed,
        })
    }

    pub fn is_random(&self) -> bool {
        self.random_mode
    }

    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    pub fn fixed(&self) -> &str {
        &self.fixed
    }

    /// Scene for the next trigger: random in random mode, fixed otherwise
    pub fn next(&self) -> &str {
        if self.random_mode {
            self.random()
        } else {
            &self.fixed
        }
    }

    /// A uniformly random scene from the pool
    pub fn random(&self) -> &str {
        self.random_with(&mut rand::thread_rng())
    }

    pub fn random_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.pool.choose(rng).map(String::as_str).unwrap_or(self.fixed.as_str())
    }
}

/// Look a scene up by name
pub fn find<'a>(catalog: &'a SceneCatalog, name: &str) -> SelectionResult<&'a Scene> {
    catalog
        .get(name)
        .ok_or_else(|| SceneError::UnknownScene(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn catalog(names: &[&str]) -> SceneCatalog {
        let mut catalog = SceneCatalog::new();
        for name in names {
            catalog
                .insert(Scene {
                    key: name.to_string(),
                    name: name.to_uppercase(),
                    description: None,
                    alternative: false,
                    steps: vec![],
                })
                .unwrap();
        }
        catalog
    }

    #[test]
    fn test_random_pool_restricts_selection() {
        let settings = Settings {
            random_scene_mode: true,
            random_scene_list: Some(vec!["a".to_string(), "b".to_string()]),
            default_scene: None,
        };
        let picker = ScenePicker::from_settings(&settings, &catalog(&["a", "b", "c"])).unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..1000 {
            *counts.entry(picker.random_with(&mut rng).to_string()).or_default() += 1;
        }

        assert!(!counts.contains_key("c"));
        assert!(counts["a"] > 0);
        assert!(counts["b"] > 0);
    }

    #[test]
    fn test_unset_pool_uses_catalog() {
        let settings = Settings {
            random_scene_mode: true,
            ..Settings::default()
        };
        let picker = ScenePicker::from_settings(&settings, &catalog(&["a", "b", "c"])).unwrap();
        assert_eq!(picker.pool(), ["a", "b", "c"]);
        assert!(picker.is_random());
    }

    #[test]
    fn test_fixed_scene() {
        let picker = ScenePicker::from_settings(&Settings::default(), &catalog(&["first", "second"])).unwrap();
        assert_eq!(picker.next(), "first");

        let settings = Settings {
            default_scene: Some("second".to_string()),
            ..Settings::default()
        };
        let picker = ScenePicker::from_settings(&settings, &catalog(&["first", "second"])).unwrap();
        assert_eq!(picker.next(), "second");
        assert_eq!(picker.fixed(), "second");
    }

    #[test]
    fn test_missing_scenes_rejected() {
        let settings = Settings {
            random_scene_mode: true,
            random_scene_list: Some(vec!["a".to_string(), "ghost".to_string()]),
            default_scene: None,
        };
        assert_eq!(
            ScenePicker::from_settings(&settings, &catalog(&["a"])).unwrap_err(),
            SceneError::UnknownScene("ghost".to_string())
        );
        assert_eq!(
            ScenePicker::from_settings(&Settings::default(), &catalog(&[])).unwrap_err(),
            SceneError::EmptyPool
        );
    }

    #[test]
    fn test_find() {
        let catalog = catalog(&["a"]);
        assert_eq!(find(&catalog, "a").unwrap().name, "A");
        assert!(matches!(find(&catalog, "b"), Err(SceneError::UnknownScene(_))));
    }
}
