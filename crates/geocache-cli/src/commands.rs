//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::{debug, warn};

use geocache_core::utils::{format_coordinate, format_distance_km, format_optional_distance};
use geocache_core::{
    haversine_km, rank_nearest, CacheManager, Config, Coordinate, FileStore, LocationResolver,
    LocationSensor, Place, PolicyKind, ResolverPolicy, ScriptedSensor, SystemClock,
};

use crate::FailMode;

/// Store and policy shared by every command.
pub struct Context {
    pub cache: CacheManager,
    pub policy: ResolverPolicy,
}

impl Context {
    pub fn load(policy: Option<PolicyKind>, store_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::load()?;
        if let Some(policy) = policy {
            config.policy = policy;
        }
        if store_dir.is_some() {
            config.store_dir = store_dir;
        }

        let dir = config.store_dir()?;
        let store = FileStore::new(dir.clone())
            .with_context(|| format!("Failed to open store: {}", dir.display()))?;
        debug!(store = %dir.display(), policy = config.policy.as_str(), "Loaded config");

        Ok(Self {
            cache: CacheManager::new(Arc::new(store), Arc::new(SystemClock)),
            policy: config.resolver_policy(),
        })
    }

    fn resolver(&self, sensor: Arc<dyn LocationSensor>) -> LocationResolver {
        LocationResolver::new(self.cache.clone(), sensor, self.policy)
    }
}

fn scripted_sensor(fix: Option<Coordinate>, fail: Option<FailMode>) -> ScriptedSensor {
    match (fix, fail) {
        (Some(coordinate), _) => ScriptedSensor::fixed(coordinate),
        (None, Some(mode)) => match mode.sensor_error() {
            Some(err) => ScriptedSensor::failing(err),
            None => ScriptedSensor::unsupported(),
        },
        (None, None) => ScriptedSensor::new(),
    }
}

pub async fn locate(
    ctx: &Context,
    fix: Option<Coordinate>,
    fail: Option<FailMode>,
    target: Option<&str>,
    refresh: bool,
) -> Result<()> {
    let mut resolver = ctx.resolver(Arc::new(scripted_sensor(fix, fail)));

    if refresh || target.is_some() {
        let pending = resolver.request_location(target);
        resolver.settle().await;
        if let Err(e) = pending.await {
            warn!(error = %e, "Location request failed");
        }
    } else {
        resolver.activate();
        // Let a background refresh write the cache before exiting
        resolver.settle().await;
    }

    println!("{}", serde_json::to_string_pretty(resolver.snapshot())?);

    if let Some(target) = target {
        let count = resolver.fail_count(target);
        eprintln!("{}: {} failed attempt(s)", target, count);
        if resolver.should_offer_manual_entry(target) {
            eprintln!("Location keeps failing; set it with `geocache manual LAT LNG`");
        }
    }
    Ok(())
}

pub fn manual(ctx: &Context, latitude: f64, longitude: f64) -> Result<()> {
    let coordinate = Coordinate::new(latitude, longitude);
    if !coordinate.is_finite() {
        anyhow::bail!("Coordinates must be finite numbers");
    }
    let mut resolver = ctx.resolver(Arc::new(ScriptedSensor::unsupported()));
    let saved = resolver.save_manual_coords(latitude, longitude)?;
    println!("Manual location set to {}", saved);
    Ok(())
}

pub fn status(ctx: &Context) -> Result<()> {
    let summary = ctx.cache.summary();
    let cached = summary.cached.as_ref().map(|c| c.coordinate);
    let manual = summary.manual.as_ref().map(|m| m.coordinate);

    println!(
        "Device fix: {} ({}{})",
        format_coordinate(cached.as_ref()),
        summary.cached_age_or_never(),
        if summary.cached.is_some() && !summary.cached_fresh {
            ", stale"
        } else {
            ""
        }
    );
    println!(
        "Manual fix: {} ({})",
        format_coordinate(manual.as_ref()),
        summary.manual_age_or_never()
    );
    Ok(())
}

pub fn fail_count(ctx: &Context, target: &str, clear: bool) -> Result<()> {
    if clear {
        ctx.cache.clear_fail_count(target)?;
        println!("{}: cleared", target);
    } else {
        println!("{}: {}", target, ctx.cache.fail_count(target));
    }
    Ok(())
}

pub fn distance(a: Coordinate, b: Coordinate) {
    println!("{}", format_distance_km(haversine_km(&a, &b)));
}

fn load_places(path: &Path) -> Result<Vec<Place>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read places: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse places: {}", path.display()))
}

pub fn rank(ctx: &Context, path: &Path, from: Option<Coordinate>) -> Result<()> {
    let places = load_places(path)?;

    // Fall back to whatever the store holds; no sensor is consulted
    let origin = from.or_else(|| {
        let mut resolver = ctx.resolver(Arc::new(ScriptedSensor::unsupported()));
        resolver.activate();
        resolver.coordinate()
    });
    if origin.is_none() {
        warn!("No location available, ranking by listed distance");
    }

    for (i, ranked) in rank_nearest(origin.as_ref(), &places).iter().enumerate() {
        let name = if ranked.place.name.is_empty() {
            &ranked.place.id
        } else {
            &ranked.place.name
        };
        println!(
            "{:>3}. {} - {}{}",
            i + 1,
            name,
            format_optional_distance(ranked.distance_km, "?"),
            if ranked.measured { "" } else { " (listed)" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocache_core::{ResolutionState, SensorError};

    fn context(dir: &Path) -> Context {
        let store = FileStore::new(dir.to_path_buf()).unwrap();
        Context {
            cache: CacheManager::new(Arc::new(store), Arc::new(SystemClock)),
            policy: ResolverPolicy::basic(),
        }
    }

    #[test]
    fn test_scripted_sensor_selection() {
        assert!(!scripted_sensor(None, Some(FailMode::Unsupported)).is_supported());
        assert!(scripted_sensor(None, None).is_supported());
        assert!(scripted_sensor(Some(Coordinate::new(1.0, 2.0)), None).is_supported());
    }

    #[tokio::test]
    async fn test_locate_persists_fix() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let fix = Coordinate::new(-23.55, -46.63);

        locate(&ctx, Some(fix), None, None, false).await.unwrap();
        assert_eq!(ctx.cache.read_fresh().map(|c| c.coordinate), Some(fix));
    }

    #[tokio::test]
    async fn test_locate_failure_counts_target() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        locate(&ctx, None, Some(FailMode::Denied), Some("market-1"), false)
            .await
            .unwrap();
        locate(&ctx, None, Some(FailMode::Timeout), Some("market-1"), false)
            .await
            .unwrap();
        assert_eq!(ctx.cache.fail_count("market-1"), 2);

        fail_count(&ctx, "market-1", true).unwrap();
        assert_eq!(ctx.cache.fail_count("market-1"), 0);
    }

    #[tokio::test]
    async fn test_manual_then_offline_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        manual(&ctx, 10.0, 20.0).unwrap();

        let mut resolver = ctx.resolver(Arc::new(ScriptedSensor::failing(SensorError::Timeout)));
        resolver.activate();
        assert_eq!(resolver.status(), ResolutionState::Granted);
        assert_eq!(resolver.coordinate(), Some(Coordinate::new(10.0, 20.0)));
    }

    #[test]
    fn test_manual_rejects_non_finite() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        assert!(manual(&ctx, f64::NAN, 0.0).is_err());
        assert!(ctx.cache.read_manual().is_none());
    }

    #[test]
    fn test_load_places() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "a", "name": "Market A", "coordinate": {"latitude": 1.0, "longitude": 2.0}},
                {"id": "b", "distance": 3.5}
            ]"#,
        )
        .unwrap();

        let places = load_places(&path).unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[1].listed_distance_km, Some(3.5));
        assert!(rank(&context(dir.path()), &path, Some(Coordinate::new(1.0, 2.0))).is_ok());
    }
}
