use super::{read_json, write_json};
use crate::core::{path_length, Coordinate};
use crate::error::EngineError;
use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const ROUTES_FILE: &str = "routes.json";
const CREATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A named route kept between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRoute {
    pub name: String,
    pub points: Vec<Coordinate>,
    /// Polyline length in kilometers
    pub total_km: f64,
    /// Local time the route was saved, `YYYY-MM-DD HH:MM:SS`
    pub create_time: String,
}

impl SavedRoute {
    /// Requires at least two points
    pub fn new(name: &str, points: Vec<Coordinate>) -> Result<Self, EngineError> {
        if points.len() < 2 {
            return Err(EngineError::InvalidRoute(format!(
                "a saved route needs at least 2 points, got {}",
                points.len()
            )));
        }
        Ok(Self {
            name: name.to_string(),
            total_km: path_length(&points) / 1000.0,
            points,
            create_time: Local::now().format(CREATE_TIME_FORMAT).to_string(),
        })
    }
}

/// Saved routes in a single `routes.json`, in insertion order
pub struct RouteStore {
    path: PathBuf,
    routes: Vec<SavedRoute>,
}

impl RouteStore {
    /// Open the store in `dir`; a missing file is an empty store
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(ROUTES_FILE);
        let routes = read_json(&path)?.unwrap_or_default();
        Ok(Self { path, routes })
    }

    pub fn routes(&self) -> &[SavedRoute] {
        &self.routes
    }

    pub fn get(&self, index: usize) -> Option<&SavedRoute> {
        self.routes.get(index)
    }

    /// Most recently saved route with this name
    pub fn find(&self, name: &str) -> Option<&SavedRoute> {
        self.routes.iter().rev().find(|r| r.name == name)
    }

    /// Append a route and persist the store
    pub fn add(&mut self, name: &str, points: Vec<Coordinate>) -> Result<&SavedRoute> {
        let route = SavedRoute::new(name, points)?;
        info!(name, points = route.points.len(), km = route.total_km, "Route saved");
        self.routes.push(route);
        self.save()?;
        Ok(&self.routes[self.routes.len() - 1])
    }

    /// Remove the route at `index` and persist the store
    pub fn delete(&mut self, index: usize) -> Result<SavedRoute> {
        if index >= self.routes.len() {
            anyhow::bail!("Invalid route index {} ({} saved)", index, self.routes.len());
        }
        let removed = self.routes.remove(index);
        self.save()?;
        info!(name = %removed.name, "Route deleted");
        Ok(removed)
    }

    pub fn save(&self) -> Result<()> {
        write_json(&self.path, &self.routes).context("Failed to save routes")
    }
}
