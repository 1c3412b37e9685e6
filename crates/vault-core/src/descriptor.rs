//! Descriptor resolver.
//!
//! A descriptor is a JSON document whose root `properties` object holds one
//! record per unit, consumed in insertion order. Records may use JSON-schema
//! style `$ref` pointers, either local (`#/definitions/fees`) or into a
//! sibling file (`shared.json#/definitions/fees`). The resolver dereferences
//! everything, validates the array-shape invariants, and hands back typed
//! units. It never touches the chain or the live state store.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::abi::AbiValue;
use crate::error::{ConfigError, ConfigResult};
use crate::primitives::Address;
use crate::reference::ContractRef;
use crate::types::Kind;
use crate::unit::*;

/// Load a deploy descriptor into ordered, validated deploy units.
pub fn load_deploy_units(path: &Path) -> ConfigResult<Vec<DeployUnit>> {
    let root = load_dereferenced(path)?;
    let units = properties(&root)?
        .iter()
        .map(|(key, value)| parse_deploy_unit(key, value))
        .collect::<ConfigResult<Vec<_>>>()?;
    debug!(path = %path.display(), units = units.len(), "deploy descriptor resolved");
    Ok(units)
}

/// Load an upgrade descriptor into ordered, validated upgrade units.
pub fn load_upgrade_units(path: &Path) -> ConfigResult<Vec<UpgradeUnit>> {
    let root = load_dereferenced(path)?;
    let units = properties(&root)?
        .iter()
        .map(|(key, value)| parse_upgrade_unit(key, value))
        .collect::<ConfigResult<Vec<_>>>()?;
    debug!(path = %path.display(), units = units.len(), "upgrade descriptor resolved");
    Ok(units)
}

/// Read `path` and replace every `$ref` with the value it points at.
pub fn load_dereferenced(path: &Path) -> ConfigResult<Value> {
    let mut resolver = RefResolver::default();
    let base = canonical(path)?;
    let document = resolver.document(&base)?;
    resolver.resolve(&document, &base, &mut Vec::new())
}

fn properties(root: &Value) -> ConfigResult<&Map<String, Value>> {
    root.get("properties")
        .ok_or_else(|| ConfigError::malformed("descriptor root has no `properties` object"))?
        .as_object()
        .ok_or_else(|| ConfigError::malformed("descriptor `properties` is not an object"))
}

// ── $ref dereferencing ──────────────────────────────────────────────

#[derive(Default)]
struct RefResolver {
    documents: HashMap<PathBuf, Value>,
}

impl RefResolver {
    fn document(&mut self, path: &Path) -> ConfigResult<Value> {
        if let Some(doc) = self.documents.get(path) {
            return Ok(doc.clone());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Value = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.documents.insert(path.to_path_buf(), doc.clone());
        Ok(doc)
    }

    /// `stack` holds the chain of references currently being expanded.
    fn resolve(&mut self, value: &Value, base: &Path, stack: &mut Vec<String>) -> ConfigResult<Value> {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.follow(reference, base, stack);
                }
                let mut out = Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.resolve(item, base, stack)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve(item, base, stack))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn follow(&mut self, reference: &str, base: &Path, stack: &mut Vec<String>) -> ConfigResult<Value> {
        let (file, pointer) = reference.split_once('#').unwrap_or((reference, ""));
        let target_path = if file.is_empty() {
            base.to_path_buf()
        } else {
            let dir = base.parent().unwrap_or_else(|| Path::new("."));
            canonical(&dir.join(file))?
        };

        let id = format!("{}#{}", target_path.display(), pointer);
        if stack.contains(&id) {
            return Err(ConfigError::malformed(format!(
                "$ref cycle: {} -> {id}",
                stack.join(" -> ")
            )));
        }

        let document = self.document(&target_path)?;
        let target = if pointer.is_empty() {
            document
        } else {
            document
                .pointer(pointer)
                .cloned()
                .ok_or_else(|| ConfigError::malformed(format!("unresolvable $ref `{reference}`")))?
        };

        stack.push(id);
        let resolved = self.resolve(&target, &target_path, stack);
        stack.pop();
        resolved
    }
}

fn canonical(path: &Path) -> ConfigResult<PathBuf> {
    path.canonicalize().map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Raw descriptor shapes ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawDeployUnit {
    name: String,
    contract_name: String,
    kind: Kind,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    multisig: Option<String>,
    #[serde(default)]
    deposit_token: Option<String>,
    #[serde(default)]
    token_args: Option<TokenArgs>,
    #[serde(default)]
    fee_args: FeeArgs,
    #[serde(default)]
    investment_limit: InvestmentLimit,
    #[serde(default)]
    oracle: Option<OracleArgs>,
    #[serde(default)]
    swap_service: Option<SwapService>,
    #[serde(default)]
    role_to_users: Option<RawRoleToUsers>,
    #[serde(default)]
    libraries: Option<RawLibraries>,
    #[serde(default)]
    investables: Option<Vec<String>>,
    #[serde(default)]
    allocations: Option<Vec<Vec<u32>>>,
    #[serde(default)]
    extra_args: Vec<AbiValue>,
}

/// Roles and their users as parallel arrays.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRoleToUsers {
    roles: Vec<String>,
    users: Vec<Vec<Address>>,
}

/// Library names and their dependency lists as parallel arrays.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLibraries {
    names: Vec<String>,
    #[serde(default)]
    dependencies: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawUpgradeUnit {
    proxy: String,
    new_implementation: String,
    #[serde(default)]
    function_name: Option<String>,
    #[serde(default)]
    function_args: Option<Vec<AbiValue>>,
    #[serde(default)]
    libraries: Option<RawLibraries>,
}

// ── Validation ──────────────────────────────────────────────────────

fn parse_deploy_unit(key: &str, value: &Value) -> ConfigResult<DeployUnit> {
    let raw: RawDeployUnit = serde_json::from_value(value.clone())
        .map_err(|e| ConfigError::malformed(format!("unit `{key}`: {e}")))?;
    if raw.contract_name.trim().is_empty() {
        return Err(ConfigError::malformed(format!("unit `{key}`: contractName is empty")));
    }

    let body = if raw.kind.is_investable() {
        UnitBody::Investable(Box::new(investable_spec(&raw)?))
    } else {
        UnitBody::Library
    };

    let libraries = match raw.libraries {
        Some(libs) => library_refs(&raw.name, libs)?,
        None => Vec::new(),
    };

    Ok(DeployUnit {
        name: raw.name,
        contract_name: raw.contract_name,
        kind: raw.kind,
        subtype: raw.subtype,
        libraries,
        body,
    })
}

fn investable_spec(raw: &RawDeployUnit) -> ConfigResult<InvestableSpec> {
    let unit = raw.name.as_str();

    let deposit_token = raw
        .deposit_token
        .as_deref()
        .ok_or_else(|| ConfigError::malformed(format!("unit `{unit}`: missing `depositToken`")))?
        .parse::<Address>()?;
    let token_args = raw
        .token_args
        .clone()
        .ok_or_else(|| ConfigError::malformed(format!("unit `{unit}`: missing `tokenArgs`")))?;

    let multisig = match raw.multisig.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(text) => Some(text.parse::<Address>()?),
    };

    let role_to_users = match &raw.role_to_users {
        Some(r) => {
            if r.roles.len() != r.users.len() {
                return Err(ConfigError::malformed(format!(
                    "unit `{unit}`: roleToUsers has {} roles but {} user lists",
                    r.roles.len(),
                    r.users.len()
                )));
            }
            r.roles
                .iter()
                .zip(&r.users)
                .map(|(role, users)| RoleAssignment {
                    role: role.clone(),
                    users: users.clone(),
                })
                .collect()
        }
        None => Vec::new(),
    };

    let (investables, allocations) = match (&raw.investables, &raw.allocations) {
        (None, None) => (Vec::new(), Vec::new()),
        (Some(inv), Some(alloc)) => {
            if inv.len() != alloc.len() {
                return Err(ConfigError::malformed(format!(
                    "unit `{unit}`: {} investables but {} allocation vectors",
                    inv.len(),
                    alloc.len()
                )));
            }
            let refs = inv
                .iter()
                .map(|r| ContractRef::parse(r))
                .collect::<ConfigResult<Vec<_>>>()?;
            (refs, alloc.clone())
        }
        _ => {
            return Err(ConfigError::malformed(format!(
                "unit `{unit}`: `investables` and `allocations` must be given together"
            )));
        }
    };

    Ok(InvestableSpec {
        owner: normalize_owner(unit, &raw.owner),
        multisig,
        deposit_token,
        token_args,
        fee_args: raw.fee_args.clone(),
        investment_limit: raw.investment_limit.clone(),
        oracle: raw.oracle.clone(),
        swap_service: raw.swap_service.clone().unwrap_or_default(),
        role_to_users,
        investables,
        allocations,
        extra_args: raw.extra_args.clone(),
    })
}

/// An owner that is not a syntactically valid address is a legal no-op:
/// role-based strategies leave the deployer as admin.
fn normalize_owner(unit: &str, raw: &str) -> Option<Address> {
    let owner = Address::parse_optional(raw);
    if owner.is_none() && !raw.trim().is_empty() && raw.trim().parse::<Address>().is_err() {
        warn!(%unit, owner = %raw, "owner is not a valid address, ownership transfer will be skipped");
    }
    owner
}

fn parse_upgrade_unit(key: &str, value: &Value) -> ConfigResult<UpgradeUnit> {
    let raw: RawUpgradeUnit = serde_json::from_value(value.clone())
        .map_err(|e| ConfigError::malformed(format!("upgrade unit `{key}`: {e}")))?;
    if raw.new_implementation.trim().is_empty() {
        return Err(ConfigError::malformed(format!("upgrade unit `{key}`: newImplementation is empty")));
    }

    let post_upgrade_call = match (raw.function_name, raw.function_args) {
        (Some(function_name), Some(args)) if !function_name.trim().is_empty() => {
            Some(PostUpgradeCall { function_name, args })
        }
        (None, None) => None,
        (name, args) => {
            warn!(
                unit = %key,
                function_name = ?name,
                has_args = args.is_some(),
                "functionName and functionArgs must be given together, skipping post-upgrade call"
            );
            None
        }
    };

    let libraries = match raw.libraries {
        Some(libs) => library_refs(key, libs)?,
        None => Vec::new(),
    };

    Ok(UpgradeUnit {
        proxy: ContractRef::parse(&raw.proxy)?,
        new_implementation: raw.new_implementation,
        post_upgrade_call,
        libraries,
    })
}

fn library_refs(unit: &str, raw: RawLibraries) -> ConfigResult<Vec<LibraryRef>> {
    // A missing `dependencies` array means no library has dependencies.
    let dependencies = if raw.dependencies.is_empty() {
        vec![Vec::new(); raw.names.len()]
    } else {
        raw.dependencies
    };
    if raw.names.len() != dependencies.len() {
        return Err(ConfigError::malformed(format!(
            "unit `{unit}`: {} library names but {} dependency lists",
            raw.names.len(),
            dependencies.len()
        )));
    }

    let libraries: Vec<LibraryRef> = raw
        .names
        .into_iter()
        .zip(dependencies)
        .map(|(name, dependencies)| LibraryRef { name, dependencies })
        .collect();
    check_library_order(unit, &libraries)?;
    Ok(libraries)
}

/// Libraries must be listed in dependency order. Dependencies that are not in
/// the list are assumed to be deployed already; the library deployer checks
/// those against the live state store.
pub fn check_library_order(unit: &str, libraries: &[LibraryRef]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for lib in libraries {
        if !seen.insert(lib.name.as_str()) {
            return Err(ConfigError::malformed(format!(
                "unit `{unit}`: library `{}` listed twice",
                lib.name
            )));
        }
    }

    if let Some(cycle) = find_cycle(libraries) {
        return Err(ConfigError::malformed(format!(
            "unit `{unit}`: library dependency cycle {}",
            cycle.join(" -> ")
        )));
    }

    let position: HashMap<&str, usize> = libraries
        .iter()
        .enumerate()
        .map(|(i, lib)| (lib.name.as_str(), i))
        .collect();
    for (i, lib) in libraries.iter().enumerate() {
        for dep in &lib.dependencies {
            if let Some(&j) = position.get(dep.as_str()) {
                if j > i {
                    return Err(ConfigError::malformed(format!(
                        "unit `{unit}`: library `{}` depends on `{dep}`, which is listed after it",
                        lib.name
                    )));
                }
            }
        }
    }
    Ok(())
}

fn find_cycle(libraries: &[LibraryRef]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Fresh,
        Active,
        Done,
    }

    fn visit<'a>(
        name: &'a str,
        edges: &HashMap<&'a str, &'a [String]>,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(name).copied().unwrap_or(Mark::Fresh) {
            Mark::Done => return None,
            Mark::Active => {
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Some(cycle);
            }
            Mark::Fresh => {}
        }
        marks.insert(name, Mark::Active);
        path.push(name);
        for dep in edges.get(name).copied().unwrap_or_default() {
            if edges.contains_key(dep.as_str()) {
                if let Some(cycle) = visit(dep.as_str(), edges, marks, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        marks.insert(name, Mark::Done);
        None
    }

    let edges: HashMap<&str, &[String]> = libraries
        .iter()
        .map(|lib| (lib.name.as_str(), lib.dependencies.as_slice()))
        .collect();
    let mut marks = HashMap::new();
    for lib in libraries {
        let mut path = Vec::new();
        if let Some(cycle) = visit(lib.name.as_str(), &edges, &mut marks, &mut path) {
            return Some(cycle);
        }
    }
    None
}
