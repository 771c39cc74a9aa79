/// Scenario discovery and lookup by id and locale.
///
/// A content tree holds three kinds of RON files:
///
/// - `<base>.logic.ron`: a logic graph
/// - `<base>.<locale>.ron`: the content pack for `<base>` in `en`, `de` or `ru`
/// - `<name>.scenario.ron`: a legacy scenario with inline text
///
/// Packs pair with the logic graph sharing their base path. Malformed files
/// are skipped with a warning and listed in [`ScenarioRegistry::skipped`].
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::config::{ConfigError, EngineConfig};
use crate::core::localization::{merge_with, MergeOptions, MergedScenario, MergeReport};
use crate::schema::content::ContentPack;
use crate::schema::legacy::LegacyScenario;
use crate::schema::logic::ScenarioLogic;
use crate::schema::scenario::Scenario;

const LOGIC_SUFFIX: &str = ".logic.ron";
const LEGACY_SUFFIX: &str = ".scenario.ron";
const RON_SUFFIX: &str = ".ron";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("content scan failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// The closed set of supported content languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    De,
    Ru,
}

impl Locale {
    pub const ALL: [Locale; 3] = [Locale::En, Locale::De, Locale::Ru];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::De => "de",
            Locale::Ru => "ru",
        }
    }

    pub fn parse(code: &str) -> Option<Locale> {
        match code {
            "en" => Some(Locale::En),
            "de" => Some(Locale::De),
            "ru" => Some(Locale::Ru),
            _ => None,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locale::parse(s).ok_or_else(|| format!("unsupported locale '{}'", s))
    }
}

/// One logic graph with whatever packs were found for it.
#[derive(Debug, Clone)]
pub struct ScenarioBundle {
    pub logic: ScenarioLogic,
    pub packs: BTreeMap<Locale, ContentPack>,
    pub logic_path: Option<PathBuf>,
    pub pack_paths: BTreeMap<Locale, PathBuf>,
}

impl ScenarioBundle {
    pub fn pack(&self, locale: Locale) -> Option<&ContentPack> {
        self.packs.get(&locale)
    }
}

/// A file the registry refused to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedModule {
    pub path: PathBuf,
    pub reason: String,
}

/// One row of [`ScenarioRegistry::manifest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub scenario_id: String,
    pub legacy: bool,
    pub locales: Vec<Locale>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioRegistry {
    bundles: IndexMap<String, ScenarioBundle>,
    legacy: IndexMap<String, Scenario>,
    skipped: Vec<SkippedModule>,
    config: EngineConfig,
}

pub struct ScenarioRegistryBuilder {
    content_roots: Vec<PathBuf>,
    config_path: Option<PathBuf>,
    config: Option<EngineConfig>,
    scenarios: Vec<(ScenarioLogic, Vec<ContentPack>)>,
    legacy: Vec<Scenario>,
}

impl ScenarioRegistry {
    pub fn builder() -> ScenarioRegistryBuilder {
        ScenarioRegistryBuilder {
            content_roots: Vec::new(),
            config_path: None,
            config: None,
            scenarios: Vec::new(),
            legacy: Vec::new(),
        }
    }

    /// Scan `content_root` with the default config.
    pub fn build_registry(content_root: impl AsRef<Path>) -> Result<ScenarioRegistry, RegistryError> {
        Self::builder().content_root(content_root).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Merged scenario for `id` in `locale`, or `None` if the id is unknown.
    pub fn get_scenario_by_id(&self, id: &str, locale: &str) -> Option<Scenario> {
        self.get_merged(id, locale).map(|m| m.scenario)
    }

    /// Like [`get_scenario_by_id`](Self::get_scenario_by_id) but keeps the
    /// merge report.
    ///
    /// The requested locale's pack is the primary; the default locale's pack
    /// stands in when it is missing and always serves as the fallback.
    pub fn get_merged(&self, id: &str, locale: &str) -> Option<MergedScenario> {
        let Some(bundle) = self.bundles.get(id) else {
            return self.legacy.get(id).map(|scenario| MergedScenario {
                scenario: scenario.clone(),
                report: MergeReport::default(),
            });
        };

        let default_locale = self.config.default_locale;
        let requested = Locale::parse(locale);
        if requested.is_none() {
            log::debug!(
                "locale '{}' is not supported; using '{}' for '{}'",
                locale,
                default_locale,
                id
            );
        }
        let fallback = bundle.pack(default_locale);
        let primary = requested.and_then(|l| bundle.pack(l)).or(fallback);

        let options = MergeOptions {
            strict: self.config.strict_localization,
        };
        let merged = match primary {
            Some(pack) => merge_with(&bundle.logic, pack, fallback, &options),
            None => {
                log::warn!("scenario '{}' has no content pack; merging against an empty one", id);
                let empty = ContentPack::empty(default_locale.as_str());
                merge_with(&bundle.logic, &empty, None, &options)
            }
        };
        Some(merged)
    }

    pub fn bundle(&self, id: &str) -> Option<&ScenarioBundle> {
        self.bundles.get(id)
    }

    pub fn bundles(&self) -> impl Iterator<Item = &ScenarioBundle> {
        self.bundles.values()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bundles.contains_key(id) || self.legacy.contains_key(id)
    }

    /// Every known scenario id: split scenarios first, then legacy ones.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.bundles
            .keys()
            .chain(self.legacy.keys().filter(|k| !self.bundles.contains_key(*k)))
            .map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.ids().count()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty() && self.legacy.is_empty()
    }

    pub fn skipped(&self) -> &[SkippedModule] {
        &self.skipped
    }

    pub fn manifest(&self) -> Vec<ManifestEntry> {
        let mut entries: Vec<ManifestEntry> = self
            .bundles
            .values()
            .map(|b| ManifestEntry {
                scenario_id: b.logic.id.clone(),
                legacy: false,
                locales: b.packs.keys().copied().collect(),
                path: b.logic_path.clone(),
            })
            .collect();
        for (id, scenario) in &self.legacy {
            if self.bundles.contains_key(id) {
                continue;
            }
            entries.push(ManifestEntry {
                scenario_id: id.clone(),
                legacy: true,
                locales: Locale::parse(&scenario.locale).into_iter().collect(),
                path: None,
            });
        }
        entries
    }

    fn insert_bundle(&mut self, bundle: ScenarioBundle) {
        let id = bundle.logic.id.clone();
        if self.bundles.contains_key(&id) {
            log::warn!("duplicate scenario id '{}'; keeping the first", id);
            self.skipped.push(SkippedModule {
                path: bundle.logic_path.unwrap_or_default(),
                reason: format!("duplicate scenario id '{}'", id),
            });
            return;
        }
        self.bundles.insert(id, bundle);
    }

    fn insert_legacy(&mut self, scenario: Scenario, path: Option<PathBuf>) {
        if self.legacy.contains_key(&scenario.id) {
            log::warn!("duplicate legacy scenario id '{}'; keeping the first", scenario.id);
            self.skipped.push(SkippedModule {
                path: path.unwrap_or_default(),
                reason: format!("duplicate legacy scenario id '{}'", scenario.id),
            });
            return;
        }
        self.legacy.insert(scenario.id.clone(), scenario);
    }

    fn skip(&mut self, path: &Path, reason: String) {
        log::warn!("skipping {}: {}", path.display(), reason);
        self.skipped.push(SkippedModule {
            path: path.to_path_buf(),
            reason,
        });
    }
}

impl ScenarioRegistryBuilder {
    /// Add a directory to scan. Missing directories are ignored.
    pub fn content_root(mut self, path: impl AsRef<Path>) -> Self {
        self.content_roots.push(path.as_ref().to_path_buf());
        self
    }

    /// Read the engine config from a RON file, if it exists.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Provide a scenario directly (for testing without files).
    pub fn with_scenario(mut self, logic: ScenarioLogic, packs: Vec<ContentPack>) -> Self {
        self.scenarios.push((logic, packs));
        self
    }

    /// Provide a legacy scenario directly (for testing without files).
    pub fn with_legacy(mut self, scenario: Scenario) -> Self {
        self.legacy.push(scenario);
        self
    }

    pub fn build(self) -> Result<ScenarioRegistry, RegistryError> {
        let mut config = self.config.unwrap_or_default();
        if let Some(ref path) = self.config_path {
            if path.exists() {
                config = EngineConfig::load_from_ron(path)?;
            }
        }

        let mut registry = ScenarioRegistry {
            config,
            ..ScenarioRegistry::default()
        };

        for (logic, packs) in self.scenarios {
            if !logic.has_valid_id() {
                log::warn!("scenario with empty id provided directly; skipping");
                registry.skipped.push(SkippedModule {
                    path: PathBuf::new(),
                    reason: "scenario id is empty".to_string(),
                });
                continue;
            }
            let mut bundle = ScenarioBundle {
                logic,
                packs: BTreeMap::new(),
                logic_path: None,
                pack_paths: BTreeMap::new(),
            };
            for pack in packs {
                match Locale::parse(&pack.locale) {
                    Some(locale) => {
                        bundle.packs.insert(locale, pack);
                    }
                    None => log::warn!(
                        "scenario '{}': ignoring pack with unsupported locale '{}'",
                        bundle.logic.id,
                        pack.locale
                    ),
                }
            }
            registry.insert_bundle(bundle);
        }

        for scenario in self.legacy {
            registry.insert_legacy(scenario, None);
        }

        for root in &self.content_roots {
            if root.exists() {
                scan_content_root(root, &mut registry)?;
            } else {
                log::debug!("content root {} does not exist", root.display());
            }
        }

        log::info!(
            "registry ready: {} scenario(s), {} legacy, {} skipped",
            registry.bundles.len(),
            registry.legacy.len(),
            registry.skipped.len()
        );
        Ok(registry)
    }
}

enum ContentFile {
    Logic { base: String },
    Pack { base: String, locale: Locale },
    Legacy,
}

fn classify(path: &Path) -> Option<ContentFile> {
    let path_str = path.to_string_lossy();
    if let Some(base) = path_str.strip_suffix(LOGIC_SUFFIX) {
        return Some(ContentFile::Logic {
            base: base.to_string(),
        });
    }
    if path_str.ends_with(LEGACY_SUFFIX) {
        return Some(ContentFile::Legacy);
    }
    let stem = path_str.strip_suffix(RON_SUFFIX)?;
    let (base, code) = stem.rsplit_once('.')?;
    let locale = Locale::parse(code)?;
    Some(ContentFile::Pack {
        base: base.to_string(),
        locale,
    })
}

/// All `.ron` files under `root`, in a stable order.
fn ron_files(root: &Path) -> Result<Vec<PathBuf>, RegistryError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|s| s.to_str()) == Some("ron") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn scan_content_root(root: &Path, registry: &mut ScenarioRegistry) -> Result<(), RegistryError> {
    let files = ron_files(root)?;

    let mut logic_files = Vec::new();
    let mut pack_files: BTreeMap<String, Vec<(Locale, PathBuf)>> = BTreeMap::new();
    let mut legacy_files = Vec::new();
    for path in files {
        match classify(&path) {
            Some(ContentFile::Logic { base }) => logic_files.push((base, path)),
            Some(ContentFile::Pack { base, locale }) => {
                pack_files.entry(base).or_default().push((locale, path))
            }
            Some(ContentFile::Legacy) => legacy_files.push(path),
            None => log::debug!("ignoring {}", path.display()),
        }
    }

    // Logic graphs.
    let mut discovered = Vec::new();
    for (base, path) in logic_files {
        match ScenarioLogic::load_from_ron(&path) {
            Ok(logic) if logic.has_valid_id() => discovered.push((base, path, logic)),
            Ok(_) => registry.skip(&path, "scenario id is missing or empty".to_string()),
            Err(e) => registry.skip(&path, e.to_string()),
        }
    }

    // Content packs, paired by base path.
    for (base, path, logic) in discovered {
        let mut bundle = ScenarioBundle {
            logic,
            packs: BTreeMap::new(),
            logic_path: Some(path),
            pack_paths: BTreeMap::new(),
        };
        for (locale, pack_path) in pack_files.remove(&base).unwrap_or_default() {
            match ContentPack::load_from_ron(&pack_path) {
                Ok(mut pack) => {
                    if pack.locale != locale.as_str() {
                        log::warn!(
                            "{} declares locale '{}'; using '{}' from its name",
                            pack_path.display(),
                            pack.locale,
                            locale
                        );
                        pack.locale = locale.as_str().to_string();
                    }
                    bundle.packs.insert(locale, pack);
                    bundle.pack_paths.insert(locale, pack_path);
                }
                Err(e) => registry.skip(&pack_path, e.to_string()),
            }
        }
        if bundle.packs.is_empty() {
            log::warn!("scenario '{}' has no content packs", bundle.logic.id);
        }
        registry.insert_bundle(bundle);
    }

    for (_, orphans) in pack_files {
        for (_, path) in orphans {
            log::warn!("content pack {} has no matching logic graph", path.display());
        }
    }

    // Legacy table.
    for path in legacy_files {
        match LegacyScenario::load_from_ron(&path) {
            Ok(legacy) => registry.insert_legacy(legacy.into_scenario(), Some(path)),
            Err(e) => registry.skip(&path, e.to_string()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::content::SceneContent;
    use crate::schema::logic::SceneLogic;

    fn make_logic(id: &str) -> ScenarioLogic {
        let mut scenes = IndexMap::new();
        scenes.insert("a".to_string(), SceneLogic::new("a"));
        ScenarioLogic {
            id: id.to_string(),
            initial_scene_id: "a".to_string(),
            scenes,
            ..ScenarioLogic::default()
        }
    }

    fn make_pack(locale: &str, text: &str) -> ContentPack {
        let mut pack = ContentPack::empty(locale);
        pack.scenes.insert(
            "a".to_string(),
            SceneContent {
                text: text.to_string(),
                ..SceneContent::default()
            },
        );
        pack
    }

    #[test]
    fn classify_file_names() {
        assert!(matches!(
            classify(Path::new("content/case/bank.logic.ron")),
            Some(ContentFile::Logic { base }) if base == "content/case/bank"
        ));
        assert!(matches!(
            classify(Path::new("content/case/bank.de.ron")),
            Some(ContentFile::Pack { base, locale: Locale::De }) if base == "content/case/bank"
        ));
        assert!(matches!(
            classify(Path::new("content/pub.scenario.ron")),
            Some(ContentFile::Legacy)
        ));
        assert!(classify(Path::new("content/case/bank.fr.ron")).is_none());
        assert!(classify(Path::new("content/engine.ron")).is_none());
    }

    #[test]
    fn requested_locale_is_primary() {
        let registry = ScenarioRegistry::builder()
            .with_scenario(make_logic("s"), vec![make_pack("en", "Hello"), make_pack("de", "Hallo")])
            .build()
            .unwrap();
        assert_eq!(registry.get_scenario_by_id("s", "de").unwrap().scenes["a"].text, "Hallo");
        assert_eq!(registry.get_scenario_by_id("s", "en").unwrap().scenes["a"].text, "Hello");
    }

    #[test]
    fn unavailable_locale_uses_default_pack() {
        let registry = ScenarioRegistry::builder()
            .with_scenario(make_logic("s"), vec![make_pack("en", "Hello")])
            .build()
            .unwrap();
        let merged = registry.get_merged("s", "fr").unwrap();
        assert_eq!(merged.scenario.scenes["a"].text, "Hello");
        assert_eq!(merged.scenario.locale, "en");
        assert!(merged.report.missing_keys.is_empty());

        let ru = registry.get_scenario_by_id("s", "ru").unwrap();
        assert_eq!(ru.scenes["a"].text, "Hello");
    }

    #[test]
    fn no_packs_still_yields_full_scenario() {
        let registry = ScenarioRegistry::builder()
            .with_scenario(make_logic("s"), vec![])
            .build()
            .unwrap();
        let merged = registry.get_merged("s", "de").unwrap();
        assert_eq!(merged.scenario.scenes["a"].text, "[MISSING TEXT: a]");
        assert_eq!(merged.report.missing_keys.len(), 1);
    }

    #[test]
    fn unknown_id_is_none() {
        let registry = ScenarioRegistry::builder().build().unwrap();
        assert!(registry.get_scenario_by_id("ghost", "en").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn first_duplicate_wins() {
        let registry = ScenarioRegistry::builder()
            .with_scenario(make_logic("s"), vec![make_pack("en", "first")])
            .with_scenario(make_logic("s"), vec![make_pack("en", "second")])
            .build()
            .unwrap();
        assert_eq!(registry.get_scenario_by_id("s", "en").unwrap().scenes["a"].text, "first");
        assert_eq!(registry.skipped().len(), 1);
    }

    #[test]
    fn empty_id_is_skipped() {
        let registry = ScenarioRegistry::builder()
            .with_scenario(make_logic("  "), vec![])
            .build()
            .unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.skipped().len(), 1);
    }

    #[test]
    fn missing_root_is_empty_registry() {
        let registry = ScenarioRegistry::build_registry("does/not/exist").unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn locale_round_trip() {
        for locale in Locale::ALL {
            assert_eq!(locale.as_str().parse::<Locale>().unwrap(), locale);
        }
        assert!("fr".parse::<Locale>().is_err());
    }
}
