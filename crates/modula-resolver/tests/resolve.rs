use std::fs;
use std::thread;

use modula_core::config::{DescriptorConflicts, OptionalMerge, ResolverConfig, SelectionPolicy};
use modula_core::dependency::DependencyConstraint;
use modula_core::descriptor::ModuleDescriptor;
use modula_core::discovery::discover;
use modula_core::identifier::Identifier;
use modula_core::module::Module;
use modula_core::registry::{ModuleRegistry, SharedRegistry};
use modula_core::version::Version;
use modula_resolver::{resolve, FailureKind, Requester, Resolution, Resolver, Selection, UnsatisfiedEdge};
use modula_util::errors::ModulaError;
use tempfile::TempDir;

fn req(s: &str) -> DependencyConstraint {
    s.parse().unwrap()
}

fn module(id: &str, version: &str, deps: &[&str]) -> Module {
    Module::detached(ModuleDescriptor::new(
        Identifier::of(id),
        Version::parse(version).unwrap(),
        deps.iter().map(|d| req(d)).collect(),
    ))
}

fn registry(modules: Vec<Module>) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    for m in modules {
        registry.add(m).unwrap();
    }
    registry
}

fn selected(selection: &Selection, id: &str) -> Option<String> {
    selection.version_of(&Identifier::of(id)).map(ToString::to_string)
}

fn success(resolution: Resolution) -> Selection {
    match resolution {
        Resolution::Success(selection) => selection,
        Resolution::Failure(failure) => panic!("expected success, got: {failure}"),
    }
}

/// Every non-optional constraint of the roots and of every selected module
/// holds for the selected versions.
fn assert_sound(roots: &[DependencyConstraint], selection: &Selection) {
    let declared = selection
        .iter()
        .flat_map(|(_, m)| m.dependencies().iter())
        .chain(roots.iter());
    for constraint in declared.filter(|c| !c.is_optional()) {
        let version = selection
            .version_of(constraint.target())
            .unwrap_or_else(|| panic!("{} not selected", constraint.target()));
        assert!(
            constraint.satisfied_by(version),
            "{constraint} violated by {version}"
        );
    }
}

fn foolib_registry() -> ModuleRegistry {
    registry(vec![
        module("FooLib", "1.0.0", &[]),
        module("FooLib", "1.2.0", &[]),
        module("FooLib", "2.0.0", &[]),
        module("ModA", "1.0.0", &["FooLib@1.0.0..2.0.0"]),
        module("ModB", "1.0.0", &["FooLib@1.2.0..3.0.0"]),
    ])
}

#[test]
fn shared_dependency_takes_highest_in_intersection() {
    let roots = [req("ModA"), req("ModB")];
    let selection = success(resolve(&roots, &foolib_registry()));
    assert_eq!(selected(&selection, "FooLib").as_deref(), Some("1.2.0"));
    assert_eq!(selection.len(), 3);
    assert_sound(&roots, &selection);
}

#[test]
fn upper_bound_is_exclusive() {
    let selection = success(resolve(&[req("ModA")], &foolib_registry()));
    assert_eq!(selected(&selection, "FooLib").as_deref(), Some("1.2.0"));
    assert!(!selection.contains(&Identifier::of("ModB")));
}

#[test]
fn missing_module_reports_requester() {
    let mut reg = foolib_registry();
    reg.add(module("ModC", "1.0.0", &["FooLib@3.0.0..4.0.0"])).unwrap();

    let resolution = resolve(&[req("ModC")], &reg);
    let failure = resolution.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::MissingModule);
    assert_eq!(failure.target, Identifier::of("FooLib"));
    assert_eq!(
        failure.unsatisfied,
        vec![UnsatisfiedEdge {
            requester: Requester::Module(Identifier::of("ModC")),
            constraint: req("FooLib@3.0.0..4.0.0"),
        }]
    );
}

#[test]
fn absent_optional_dependency_is_dropped() {
    let reg = registry(vec![module("ModD", "1.0.0", &["OptionalLib?"])]);
    let selection = success(resolve(&[req("ModD")], &reg));
    assert_eq!(selection.len(), 1);
    assert!(!selection.contains(&Identifier::of("OptionalLib")));
}

#[test]
fn cycle_resolves_once() {
    let reg = registry(vec![
        module("ModX", "1.0.0", &["ModY@1.0.0..2.0.0"]),
        module("ModY", "1.0.0", &["ModX@1.0.0..2.0.0"]),
    ]);
    let selection = success(resolve(&[req("ModX")], &reg));
    assert_eq!(selected(&selection, "ModX").as_deref(), Some("1.0.0"));
    assert_eq!(selected(&selection, "ModY").as_deref(), Some("1.0.0"));

    let order: Vec<_> = selection.load_order().iter().map(|m| m.id().to_string()).collect();
    assert_eq!(order, vec!["ModX", "ModY"]);
}

fn backtracking_registry() -> ModuleRegistry {
    registry(vec![
        module("App", "1.0.0", &["Lib", "Core@1.0.0..2.0.0"]),
        module("Lib", "1.0.0", &["Core@1.0.0..2.0.0"]),
        module("Lib", "2.0.0", &["Core@2.0.0..3.0.0"]),
        module("Core", "1.0.0", &[]),
        module("Core", "2.0.0", &[]),
    ])
}

#[test]
fn backtracks_to_older_version() {
    let roots = [req("App")];
    let selection = success(resolve(&roots, &backtracking_registry()));
    assert_eq!(selected(&selection, "Lib").as_deref(), Some("1.0.0"));
    assert_eq!(selected(&selection, "Core").as_deref(), Some("1.0.0"));
    assert_sound(&roots, &selection);
}

#[test]
fn exhausted_search_reports_version_conflict() {
    let reg = registry(vec![
        module("App", "1.0.0", &["Lib", "Core@1.0.0..2.0.0"]),
        module("Lib", "2.0.0", &["Core@2.0.0..3.0.0"]),
        module("Core", "1.0.0", &[]),
        module("Core", "2.0.0", &[]),
    ]);
    let resolution = resolve(&[req("App")], &reg);
    let failure = resolution.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::VersionConflict);
    assert_eq!(failure.target, Identifier::of("Core"));
    assert_eq!(failure.len(), 2);
    assert_eq!(
        failure.unsatisfied[0].requester,
        Requester::Module(Identifier::of("App"))
    );
    assert_eq!(
        failure.unsatisfied[1].requester,
        Requester::Module(Identifier::of("Lib"))
    );

    let err = resolution.into_result().unwrap_err();
    assert!(matches!(err, ModulaError::VersionConflict { .. }));
    assert!(err.to_string().contains("Lib requires Core[2.0.0,3.0.0)"));
}

#[test]
fn failure_describes_only_the_last_conflict() {
    let reg = registry(vec![
        module("App", "2.0.0", &["Gone"]),
        module("App", "1.0.0", &["Lost"]),
    ]);
    let resolution = resolve(&[req("App")], &reg);
    let failure = resolution.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::MissingModule);
    assert_eq!(failure.target, Identifier::of("Lost"));
    assert_eq!(failure.len(), 1);
    assert!(failure.unsatisfied.iter().all(|e| e.constraint.target() != &Identifier::of("Gone")));
}

#[test]
fn incompatible_optional_dependency_is_skipped() {
    let reg = registry(vec![
        module("Host", "1.0.0", &["Core@1.0.0..2.0.0", "Plugin?"]),
        module("Plugin", "1.0.0", &["Core@2.0.0..3.0.0"]),
        module("Core", "1.0.0", &[]),
        module("Core", "2.0.0", &[]),
    ]);
    let roots = [req("Host")];
    let selection = success(resolve(&roots, &reg));
    assert!(!selection.contains(&Identifier::of("Plugin")));
    assert_eq!(selected(&selection, "Core").as_deref(), Some("1.0.0"));
    assert_sound(&roots, &selection);
}

#[test]
fn optional_dependency_prefers_compatible_older_version_over_skip() {
    let reg = registry(vec![
        module("Host", "1.0.0", &["Core@1.0.0..2.0.0", "Plugin?"]),
        module("Plugin", "0.9.0", &["Core@1.0.0..2.0.0"]),
        module("Plugin", "1.0.0", &["Core@2.0.0..3.0.0"]),
        module("Core", "1.0.0", &[]),
        module("Core", "2.0.0", &[]),
    ]);
    let selection = success(resolve(&[req("Host")], &reg));
    assert_eq!(selected(&selection, "Plugin").as_deref(), Some("0.9.0"));
}

#[test]
fn optional_edge_on_committed_module_is_dropped() {
    let reg = registry(vec![
        module("Addon", "1.0.0", &["Core@2.0.0..3.0.0?"]),
        module("Core", "1.0.0", &[]),
        module("Core", "2.0.0", &[]),
    ]);
    let roots = [req("Core@1.0.0..2.0.0"), req("Addon")];
    let selection = success(resolve(&roots, &reg));
    assert_eq!(selected(&selection, "Core").as_deref(), Some("1.0.0"));
    assert_eq!(selected(&selection, "Addon").as_deref(), Some("1.0.0"));
}

#[test]
fn conflicting_root_requirements() {
    let reg = backtracking_registry();
    let resolution = resolve(&[req("Core@1.0.0..2.0.0"), req("Core@2.0.0")], &reg);
    let failure = resolution.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::ConstraintConflict);
    assert_eq!(failure.target, Identifier::of("Core"));
    assert!(failure.unsatisfied.iter().all(|e| e.requester == Requester::Root));
}

fn broken_descriptor_registry() -> ModuleRegistry {
    registry(vec![
        module("Lib", "1.0.0", &["Core"]),
        module("Lib", "2.0.0", &["Core@1.0.0..2.0.0", "Core@3.0.0"]),
        module("Core", "1.0.0", &[]),
    ])
}

#[test]
fn self_conflicting_descriptor_is_never_selected() {
    let selection = success(resolve(&[req("Lib")], &broken_descriptor_registry()));
    assert_eq!(selected(&selection, "Lib").as_deref(), Some("1.0.0"));
}

#[test]
fn requiring_only_a_broken_descriptor_reports_constraint_conflict() {
    let resolution = resolve(&[req("Lib@2.0.0")], &broken_descriptor_registry());
    let failure = resolution.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::ConstraintConflict);
    assert_eq!(failure.target, Identifier::of("Lib"));
    assert_eq!(failure.len(), 3);
    assert_eq!(failure.unsatisfied[2].requester, Requester::Root);

    let err = resolution.into_result().unwrap_err();
    assert!(matches!(err, ModulaError::ConstraintConflict { .. }));
}

#[test]
fn lowest_first_policy() {
    let resolver =
        Resolver::new(ResolverConfig::default().with_selection(SelectionPolicy::LowestFirst));
    let snapshot = foolib_registry().snapshot();

    let selection = success(resolver.resolve(&[req("FooLib")], &snapshot));
    assert_eq!(selected(&selection, "FooLib").as_deref(), Some("1.0.0"));

    let roots = [req("ModA"), req("ModB")];
    let selection = success(resolver.resolve(&roots, &snapshot));
    assert_eq!(selected(&selection, "FooLib").as_deref(), Some("1.2.0"));
    assert_sound(&roots, &selection);
}

#[test]
fn optional_merge_policy_decides_mixed_constraints() {
    let reg = registry(vec![module("M", "1.0.0", &["X?", "X@1.0.0"])]);

    let failure = resolve(&[req("M")], &reg);
    assert_eq!(failure.failure().map(|f| f.kind), Some(FailureKind::MissingModule));

    let resolver =
        Resolver::new(ResolverConfig::default().with_optional_merge(OptionalMerge::AnyOptional));
    let selection = success(resolver.resolve(&[req("M")], &reg.snapshot()));
    assert_eq!(selection.len(), 1);
}

#[test]
fn search_explores_every_combination_before_failing() {
    let reg = registry(vec![
        module("A", "1.0.0", &["Core@1.0.0..2.0.0"]),
        module("A", "2.0.0", &["Core@2.0.0"]),
        module("A", "3.0.0", &["Core@2.0.0"]),
        module("B", "1.0.0", &["Core@1.0.0..2.0.0"]),
        module("B", "2.0.0", &["Core@1.0.0..2.0.0"]),
        module("B", "3.0.0", &["Core@1.0.0..2.0.0"]),
        module("Core", "1.0.0", &[]),
    ]);
    let roots = [req("A"), req("B")];
    let selection = success(resolve(&roots, &reg));
    assert_eq!(selected(&selection, "A").as_deref(), Some("1.0.0"));
    assert_eq!(selected(&selection, "B").as_deref(), Some("3.0.0"));
    assert_sound(&roots, &selection);
}

/// `X0..X19` at 1.0.0 and 2.0.0, each required by the roots alongside `last`.
fn many_independent_roots(extra: Vec<Module>, last: &str) -> (ModuleRegistry, Vec<DependencyConstraint>) {
    let mut modules = extra;
    let mut roots = Vec::new();
    for i in 0..20 {
        let id = format!("X{i}");
        modules.push(module(&id, "1.0.0", &[]));
        modules.push(module(&id, "2.0.0", &[]));
        roots.push(req(&id));
    }
    roots.push(req(last));
    (registry(modules), roots)
}

#[test]
fn dead_end_after_many_independent_roots_fails_quickly() {
    let (reg, roots) = many_independent_roots(vec![module("Bad", "1.0.0", &["Missing"])], "Bad");
    let resolution = resolve(&roots, &reg);
    let failure = resolution.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::MissingModule);
    assert_eq!(failure.target, Identifier::of("Missing"));
    assert_eq!(
        failure.unsatisfied,
        vec![UnsatisfiedEdge {
            requester: Requester::Module(Identifier::of("Bad")),
            constraint: req("Missing"),
        }]
    );
}

#[test]
fn dead_end_version_is_replaced_without_touching_siblings() {
    let (reg, roots) = many_independent_roots(
        vec![
            module("App", "2.0.0", &["Missing"]),
            module("App", "1.0.0", &[]),
        ],
        "App",
    );
    let selection = success(resolve(&roots, &reg));
    assert_eq!(selected(&selection, "App").as_deref(), Some("1.0.0"));
    for i in 0..20 {
        assert_eq!(selected(&selection, &format!("X{i}")).as_deref(), Some("2.0.0"));
    }
    assert_sound(&roots, &selection);
}

#[test]
fn broken_descriptor_fails_fast_when_configured() {
    let resolver = Resolver::new(
        ResolverConfig::default().with_descriptor_conflicts(DescriptorConflicts::Fail),
    );
    let resolution = resolver.resolve(&[req("Lib")], &broken_descriptor_registry().snapshot());
    let failure = resolution.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::ConstraintConflict);
    assert_eq!(failure.target, Identifier::of("Core"));
    assert!(failure
        .unsatisfied
        .iter()
        .all(|e| e.requester == Requester::Module(Identifier::of("Lib"))));

    let err = resolution.into_result().unwrap_err();
    assert!(matches!(err, ModulaError::ConstraintConflict { .. }));
}

#[test]
fn resolution_is_deterministic() {
    let roots = [req("App")];
    let forward = backtracking_registry();
    let reversed = registry(vec![
        module("Core", "2.0.0", &[]),
        module("Core", "1.0.0", &[]),
        module("Lib", "2.0.0", &["Core@2.0.0..3.0.0"]),
        module("Lib", "1.0.0", &["Core@1.0.0..2.0.0"]),
        module("App", "1.0.0", &["Lib", "Core@1.0.0..2.0.0"]),
    ]);

    let first = resolve(&roots, &forward);
    assert_eq!(first, resolve(&roots, &forward));
    assert_eq!(first, resolve(&roots, &reversed));
}

#[test]
fn selection_graph_records_requesters() {
    let selection = success(resolve(&[req("ModA"), req("ModB")], &foolib_registry()));
    let graph = selection.graph();
    let foolib = graph.find(&Identifier::of("FooLib")).unwrap();
    let dependents: Vec<_> = graph
        .dependents_of(foolib)
        .into_iter()
        .filter_map(|(idx, _)| graph.node(idx).module())
        .map(|m| m.id().to_string())
        .collect();
    assert_eq!(dependents, vec!["ModA", "ModB"]);

    let order = selection.load_order();
    assert_eq!(order[0].id(), &Identifier::of("FooLib"));
    assert_eq!(order.len(), 3);
}

#[test]
fn concurrent_resolutions_share_a_snapshot() {
    let shared = SharedRegistry::new(backtracking_registry());
    let snapshot = shared.snapshot();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let snapshot = snapshot.clone();
            thread::spawn(move || Resolver::default().resolve(&[req("App")], &snapshot))
        })
        .collect();

    shared.add(module("Lib", "3.0.0", &[])).unwrap();

    for handle in handles {
        let selection = success(handle.join().unwrap());
        assert_eq!(selected(&selection, "Lib").as_deref(), Some("1.0.0"));
    }
    let latest = success(Resolver::default().resolve(&[req("App")], &shared.snapshot()));
    assert_eq!(selected(&latest, "Lib").as_deref(), Some("3.0.0"));
}

#[test]
fn resolves_discovered_modules() {
    let tmp = TempDir::new().unwrap();
    for (dir, json) in [
        ("app", r#"{"id": "App", "version": "1.0.0", "dependencies": [{"id": "Core", "minVersion": "1.0.0", "maxVersion": "2.0.0"}]}"#),
        ("core-1", r#"{"id": "Core", "version": "1.4.0"}"#),
        ("core-2", r#"{"id": "Core", "version": "2.0.0"}"#),
    ] {
        fs::create_dir_all(tmp.path().join(dir)).unwrap();
        fs::write(tmp.path().join(dir).join("module.json"), json).unwrap();
    }

    let reg = discover(tmp.path()).unwrap();
    let selection = success(resolve(&[req("App")], &reg));
    let core = selection.get(&Identifier::of("Core")).unwrap();
    assert_eq!(core.version(), &Version::new(1, 4, 0));
    assert_eq!(
        core.source().location(),
        Some(tmp.path().join("core-1").as_path())
    );
}
