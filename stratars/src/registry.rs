use std::collections::HashMap;
use std::fs;
use std::path::Path;

use glob::glob;

use crate::error::{Result, StrataError};
use crate::schema::{Aggregation, Cube};

/// Read-only collection of cube definitions. Built once (at service startup
/// or per test) and shared across compilations.
#[derive(Debug, Default, Clone)]
pub struct CubeRegistry {
    cubes: HashMap<String, Cube>,
}

impl CubeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cubes(cubes: Vec<Cube>) -> Self {
        let mut registry = CubeRegistry::new();
        for cube in cubes {
            registry.cubes.insert(cube.name.clone(), cube);
        }
        registry
    }

    /// Load every `*.yml` / `*.yaml` cube definition under `dir`.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Err(StrataError::Schema(format!(
                "cube directory not found: {}",
                dir.display()
            )));
        }
        let mut registry = CubeRegistry::new();
        for pattern in ["*.yml", "*.yaml"] {
            for entry in glob(&format!("{}/{pattern}", dir.display()))
                .map_err(|e| StrataError::Other(e.into()))?
                .flatten()
            {
                let contents = fs::read_to_string(&entry)?;
                let cube: Cube = serde_yaml::from_str(&contents)?;
                registry.cubes.insert(cube.name.clone(), cube);
            }
        }
        registry.validate()?;
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&Cube> {
        self.cubes.get(name)
    }

    pub fn cube_names(&self) -> impl Iterator<Item = &str> {
        self.cubes.keys().map(String::as_str)
    }

    /// Structural checks cheap enough to run at load time: every non-count
    /// measure carries an expression and every join edge targets a known
    /// cube with at least one key. Deeper checks happen at compile time.
    pub fn validate(&self) -> Result<()> {
        for cube in self.cubes.values() {
            for (name, measure) in &cube.measures {
                if measure.sql.is_none() && measure.aggregation != Aggregation::Count {
                    return Err(StrataError::Schema(format!(
                        "measure {}.{name} requires sql for its aggregation",
                        cube.name
                    )));
                }
            }
            for join in &cube.joins {
                if !self.cubes.contains_key(&join.cube) {
                    return Err(StrataError::Schema(format!(
                        "cube {} declares a join to unknown cube {}",
                        cube.name, join.cube
                    )));
                }
                if join.keys.is_empty() {
                    return Err(StrataError::Schema(format!(
                        "join from {} to {} has no keys",
                        cube.name, join.cube
                    )));
                }
            }
        }
        Ok(())
    }
}
