//! Compiled contract artifacts.
//!
//! Compilation is left to the contract toolchain. This module only finds the
//! JSON artifact it produced for a contract and reads the creation bytecode.
//! Both the Hardhat layout (`artifacts/contracts/Foo.sol/Foo.json`, bytecode
//! as a hex string) and the Foundry layout (`out/Foo.sol/Foo.json`, bytecode
//! under `bytecode.object`) are understood.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Directories produced by the toolchain that never hold contract artifacts.
const IGNORED_DIRS: [&str; 2] = ["build-info", "cache"];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArtifactBytecode {
    Hex(String),
    Object { object: String },
}

#[derive(Debug, Deserialize)]
struct Artifact {
    bytecode: ArtifactBytecode,
}

/// Looks up contract artifacts below a root directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the artifact file of `contract`.
    ///
    /// Fails if none or more than one artifact has that name.
    pub fn find(&self, contract: &str) -> Result<PathBuf> {
        let file_name = format!("{contract}.json");
        let mut matches = Vec::new();
        collect_matches(&self.root, &file_name, &mut matches)?;

        match matches.len() {
            0 => anyhow::bail!(
                "No artifact found for contract `{}` under {}. Was it compiled?",
                contract,
                self.root.display()
            ),
            1 => Ok(matches.remove(0)),
            _ => anyhow::bail!(
                "Contract name `{}` is ambiguous, found {} artifacts: {:?}",
                contract,
                matches.len(),
                matches
            ),
        }
    }

    /// Read the creation bytecode of `contract`.
    pub fn bytecode(&self, contract: &str) -> Result<Bytes> {
        let path = self.find(contract)?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;

        parse_bytecode(&content)
            .with_context(|| format!("Invalid artifact for contract `{}`", contract))
    }
}

fn collect_matches(dir: &Path, file_name: &str, matches: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read artifacts directory {}", dir.display()))?;

    for entry in entries {
        let path = entry.context("Failed to read directory entry")?.path();

        if path.is_dir() {
            let ignored = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| IGNORED_DIRS.contains(&name));
            if !ignored {
                collect_matches(&path, file_name, matches)?;
            }
        } else if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name == file_name)
        {
            matches.push(path);
        }
    }

    Ok(())
}

fn parse_bytecode(content: &str) -> Result<Bytes> {
    let artifact: Artifact =
        serde_json::from_str(content).context("Failed to parse artifact JSON")?;

    let hex_code = match artifact.bytecode {
        ArtifactBytecode::Hex(code) => code,
        ArtifactBytecode::Object { object } => object,
    };

    // Unlinked library placeholders look like `__$<hash>$__`.
    if hex_code.contains("__") {
        anyhow::bail!("Bytecode has unlinked library references");
    }

    let code = hex::decode(hex_code.trim().trim_start_matches("0x"))
        .context("Failed to decode bytecode hex")?;

    if code.is_empty() {
        anyhow::bail!("Bytecode is empty. Abstract contracts and interfaces cannot be deployed");
    }

    Ok(Bytes::from(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_hardhat_artifact() {
        let temp_dir = TempDir::new("phantasy-artifacts").unwrap();
        let root = temp_dir.path().join("artifacts");
        write(
            &root.join("contracts/Elixir.sol/Elixir.json"),
            r#"{ "contractName": "Elixir", "bytecode": "0x6080604052" }"#,
        );
        write(
            &root.join("contracts/Elixir.sol/Elixir.dbg.json"),
            r#"{ "buildInfo": "../../build-info/abc.json" }"#,
        );
        write(
            &root.join("build-info/Elixir.json"),
            r#"{ "bytecode": "0x00" }"#,
        );

        let store = ArtifactStore::new(&root);
        let code = store.bytecode("Elixir").unwrap();
        assert_eq!(code.to_vec(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);
    }

    #[test]
    fn test_foundry_artifact() {
        let temp_dir = TempDir::new("phantasy-artifacts").unwrap();
        write(
            &temp_dir.path().join("Router.sol/PhantasySwapRouterV01.json"),
            r#"{ "bytecode": { "object": "0x6080", "linkReferences": {} } }"#,
        );

        let store = ArtifactStore::new(temp_dir.path());
        assert_eq!(store.bytecode("PhantasySwapRouterV01").unwrap().len(), 2);
    }

    #[test]
    fn test_missing_and_ambiguous_artifacts() {
        let temp_dir = TempDir::new("phantasy-artifacts").unwrap();
        write(&temp_dir.path().join("a/Token.json"), r#"{ "bytecode": "0x60" }"#);
        write(&temp_dir.path().join("b/Token.json"), r#"{ "bytecode": "0x60" }"#);

        let store = ArtifactStore::new(temp_dir.path());
        assert!(store.find("Factory").is_err());
        assert!(store.find("Token").is_err());
    }

    #[test]
    fn test_invalid_bytecode() {
        assert!(parse_bytecode(r#"{ "bytecode": "0x" }"#).is_err());
        assert!(parse_bytecode(r#"{ "bytecode": "0x6080__$1234$__" }"#).is_err());
        assert!(parse_bytecode(r#"{ "abi": [] }"#).is_err());
    }
}
