//! Configuration attributes, keyed change notifications and engine settings.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use field::FieldSettings;
use foundation::View;
use particles::AnimationSettings;
use runtime::{Emitter, ListenerId};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigKey {
    Date,
    Hour,
    Param,
    Surface,
    Level,
    Projection,
    Orientation,
    Topology,
    OverlayType,
    ShowGridPoints,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 10] = [
        ConfigKey::Date,
        ConfigKey::Hour,
        ConfigKey::Param,
        ConfigKey::Surface,
        ConfigKey::Level,
        ConfigKey::Projection,
        ConfigKey::Orientation,
        ConfigKey::Topology,
        ConfigKey::OverlayType,
        ConfigKey::ShowGridPoints,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::Date => "date",
            ConfigKey::Hour => "hour",
            ConfigKey::Param => "param",
            ConfigKey::Surface => "surface",
            ConfigKey::Level => "level",
            ConfigKey::Projection => "projection",
            ConfigKey::Orientation => "orientation",
            ConfigKey::Topology => "topology",
            ConfigKey::OverlayType => "overlayType",
            ConfigKey::ShowGridPoints => "showGridPoints",
        }
    }
}

/// Overlay type meaning "color by the primary product".
pub const DEFAULT_OVERLAY: &str = "default";
/// Overlay type that hides the color overlay.
pub const OVERLAY_OFF: &str = "off";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Attributes {
    pub date: String,
    pub hour: String,
    pub param: String,
    pub surface: String,
    pub level: String,
    pub projection: String,
    /// `"λ,φ,scale"`, or empty for the projection's default view.
    pub orientation: String,
    /// Coastline resource path.
    pub topology: String,
    pub overlay_type: String,
    pub show_grid_points: bool,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            date: "current".to_string(),
            hour: String::new(),
            param: "ocean".to_string(),
            surface: "surface".to_string(),
            level: "currents".to_string(),
            projection: "orthographic".to_string(),
            orientation: String::new(),
            topology: "ne_110m_land.json".to_string(),
            overlay_type: DEFAULT_OVERLAY.to_string(),
            show_grid_points: false,
        }
    }
}

impl Attributes {
    /// Keys whose values differ between `self` and `other`.
    pub fn diff(&self, other: &Attributes) -> BTreeSet<ConfigKey> {
        ConfigKey::ALL
            .into_iter()
            .filter(|key| self.get(*key) != other.get(*key))
            .collect()
    }

    /// Value of `key` as text.
    pub fn get(&self, key: ConfigKey) -> String {
        match key {
            ConfigKey::Date => self.date.clone(),
            ConfigKey::Hour => self.hour.clone(),
            ConfigKey::Param => self.param.clone(),
            ConfigKey::Surface => self.surface.clone(),
            ConfigKey::Level => self.level.clone(),
            ConfigKey::Projection => self.projection.clone(),
            ConfigKey::Orientation => self.orientation.clone(),
            ConfigKey::Topology => self.topology.clone(),
            ConfigKey::OverlayType => self.overlay_type.clone(),
            ConfigKey::ShowGridPoints => self.show_grid_points.to_string(),
        }
    }

    /// Overlay type with an empty value read as the default.
    pub fn overlay_type(&self) -> &str {
        if self.overlay_type.is_empty() {
            DEFAULT_OVERLAY
        } else {
            &self.overlay_type
        }
    }
}

/// Who issued a save.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeSource {
    User,
    /// Orientation written back when a camera move settles.
    MoveEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    pub changed: BTreeSet<ConfigKey>,
    pub source: ChangeSource,
}

impl ConfigChange {
    pub fn contains(&self, key: ConfigKey) -> bool {
        self.changed.contains(&key)
    }

    pub fn touches(&self, keys: &[ConfigKey]) -> bool {
        keys.iter().any(|key| self.changed.contains(key))
    }
}

struct Inner {
    attributes: RefCell<Attributes>,
    saved: Cell<bool>,
    changes: Emitter<ConfigChange>,
}

/// Shared, observable configuration store.
#[derive(Clone)]
pub struct Configuration {
    inner: Rc<Inner>,
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("attributes", &*self.inner.attributes.borrow())
            .finish()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(Attributes::default())
    }
}

impl Configuration {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            inner: Rc::new(Inner {
                attributes: RefCell::new(attributes),
                saved: Cell::new(false),
                changes: Emitter::default(),
            }),
        }
    }

    pub fn attributes(&self) -> Attributes {
        self.inner.attributes.borrow().clone()
    }

    pub fn get(&self, key: ConfigKey) -> String {
        self.inner.attributes.borrow().get(key)
    }

    /// Applies `update` and notifies listeners of the keys it changed. The
    /// first save reports every key, so listeners see the initial state as
    /// one big change. Returns the changed keys; nothing is emitted when
    /// the set is empty.
    pub fn save(
        &self,
        source: ChangeSource,
        update: impl FnOnce(&mut Attributes),
    ) -> BTreeSet<ConfigKey> {
        let changed = {
            let mut attributes = self.inner.attributes.borrow_mut();
            let before = attributes.clone();
            update(&mut *attributes);
            if self.inner.saved.replace(true) {
                before.diff(&*attributes)
            } else {
                ConfigKey::ALL.into_iter().collect()
            }
        };
        if !changed.is_empty() {
            debug!(
                keys = ?changed.iter().map(ConfigKey::as_str).collect::<Vec<_>>(),
                ?source,
                "configuration changed"
            );
            self.inner.changes.emit(&ConfigChange {
                changed: changed.clone(),
                source,
            });
        }
        changed
    }

    pub fn listen(&self, f: impl Fn(&ConfigChange) + 'static) -> ListenerId {
        self.inner.changes.listen(f)
    }

    pub fn unlisten(&self, id: ListenerId) -> bool {
        self.inner.changes.unlisten(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputSettings {
    /// Quiet time after the last gesture before a move counts as settled.
    pub move_end_wait_ms: u64,
    /// Trailing throttle of map redraws while dragging.
    pub redraw_wait_ms: u64,
    /// Pointer travel below which a gesture is still a click.
    pub min_move_px: f64,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            move_end_wait_ms: 1000,
            redraw_wait_ms: 5,
            min_move_px: 4.0,
        }
    }
}

/// Tunables of the whole engine, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    pub width: u32,
    pub height: u32,
    pub field: FieldSettings,
    pub animation: AnimationSettings,
    pub input: InputSettings,
    /// Seed of the particle placement RNG; random when absent.
    pub seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            field: FieldSettings::default(),
            animation: AnimationSettings::default(),
            input: InputSettings::default(),
            seed: None,
        }
    }
}

impl EngineSettings {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn view(&self) -> View {
        View::new(self.width.max(1), self.height.max(1))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::{
        Attributes, ChangeSource, ConfigChange, ConfigKey, Configuration, EngineSettings,
    };

    fn recorded(config: &Configuration) -> Rc<RefCell<Vec<ConfigChange>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        config.listen(move |change| sink.borrow_mut().push(change.clone()));
        seen
    }

    #[test]
    fn first_save_reports_every_key() {
        let config = Configuration::default();
        let seen = recorded(&config);
        let changed = config.save(ChangeSource::User, |_| {});
        assert_eq!(changed.len(), ConfigKey::ALL.len());
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn later_saves_report_only_differences() {
        let config = Configuration::default();
        config.save(ChangeSource::User, |_| {});
        let seen = recorded(&config);

        config.save(ChangeSource::MoveEnd, |a| a.orientation = "10.00,20.00,300".into());
        config.save(ChangeSource::User, |a| a.orientation = "10.00,20.00,300".into());
        config.save(ChangeSource::User, |a| {
            a.overlay_type = "off".into();
            a.show_grid_points = true;
        });

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].source, ChangeSource::MoveEnd);
        assert_eq!(seen[0].changed.iter().copied().collect::<Vec<_>>(), vec![ConfigKey::Orientation]);
        assert!(seen[1].touches(&[ConfigKey::OverlayType]));
        assert!(seen[1].contains(ConfigKey::ShowGridPoints));
        assert!(!seen[1].contains(ConfigKey::Date));
        assert_eq!(config.get(ConfigKey::ShowGridPoints), "true");
    }

    #[test]
    fn attributes_use_camel_case_json() {
        let json = r#"{"overlayType": "off", "showGridPoints": true, "projection": "equirectangular"}"#;
        let attributes: Attributes = serde_json::from_str(json).unwrap();
        assert_eq!(attributes.overlay_type(), "off");
        assert!(attributes.show_grid_points);
        assert_eq!(attributes.param, "ocean");
        assert_eq!(Attributes { overlay_type: String::new(), ..attributes }.overlay_type(), "default");
    }

    #[test]
    fn settings_fill_missing_fields() {
        let settings =
            EngineSettings::from_json(br#"{"width": 200, "animation": {"frameMs": 25}, "seed": 9}"#)
                .unwrap();
        assert_eq!(settings.width, 200);
        assert_eq!(settings.height, 768);
        assert_eq!(settings.animation.frame_ms, 25);
        assert_eq!(settings.animation.max_particle_age, 100);
        assert_eq!(settings.field.max_task_time_ms, 100);
        assert_eq!(settings.input.move_end_wait_ms, 1000);
        assert_eq!(settings.seed, Some(9));
    }
}
