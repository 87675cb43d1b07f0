//src/taxdb.rs

use std::io::BufRead;
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};

use crate::error::{Error, Result};
use crate::io::{numbered_lines, open_reader};
use crate::taxonomy::{LineageMode, LineageOrder, TaxonomyStore, MISSING_RANK_PLACEHOLDER};

pub type ParentMap = AHashMap<String, String>;
pub type NameMap = AHashMap<String, String>;
pub type RankMap = AHashMap<String, String>;

/// In-memory taxonomy tree keyed by taxid strings.
///
/// Built once from dump files and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct Taxdump {
    parent_map: ParentMap,
    name_map: NameMap,
    rank_map: RankMap,
    root: Option<String>,
}

/// Split an NCBI `.dmp` row (`a\t|\tb\t|\t...\t|`) into its fields.
fn split_dmp_line(line: &str) -> Vec<&str> {
    let body = line.strip_suffix("\t|").unwrap_or(line);
    body.split("\t|\t").map(str::trim).collect()
}

fn parse_error(path: &Path, line: usize, msg: impl Into<String>) -> Error {
    Error::Parse {
        path: path.to_path_buf(),
        line,
        msg: msg.into(),
    }
}

impl Taxdump {
    /// Build a taxonomy from already parsed maps. Every key of `parent_map`
    /// becomes a node; nodes lacking a name are named after their taxid and
    /// nodes lacking a rank get `no rank`.
    pub fn from_maps(parent_map: ParentMap, mut name_map: NameMap, mut rank_map: RankMap) -> Self {
        name_map.retain(|taxid, _| parent_map.contains_key(taxid));
        rank_map.retain(|taxid, _| parent_map.contains_key(taxid));

        for taxid in parent_map.keys() {
            name_map.entry(taxid.clone()).or_insert_with(|| taxid.clone());
            rank_map.entry(taxid.clone()).or_insert_with(|| "no rank".to_string());
        }

        // The root is its own parent. Pick the smallest such id so that a
        // malformed dump with several self-parented nodes stays deterministic.
        let root = parent_map
            .iter()
            .filter(|(child, parent)| child == parent)
            .map(|(child, _)| child.clone())
            .min();

        Self {
            parent_map,
            name_map,
            rank_map,
            root,
        }
    }

    /// Load an NCBI new_taxdump pair: parent links and ranks from
    /// `nodes.dmp`, scientific names from `rankedlineage.dmp`.
    pub fn from_ncbi<P: AsRef<Path>, Q: AsRef<Path>>(nodes_dmp: P, rankedlineage_dmp: Q) -> Result<Self> {
        let nodes_path = nodes_dmp.as_ref();
        let lineage_path = rankedlineage_dmp.as_ref();
        let taxdump = Self::from_ncbi_readers(
            open_reader(nodes_path)?,
            nodes_path,
            open_reader(lineage_path)?,
            lineage_path,
        )?;
        log::info!(
            "Loaded taxonomy with {} nodes from {} and {}",
            taxdump.len(),
            nodes_path.display(),
            lineage_path.display()
        );
        Ok(taxdump)
    }

    /// Same as [`Taxdump::from_ncbi`] over arbitrary readers; the paths are
    /// only used in error messages.
    pub fn from_ncbi_readers<R1: BufRead, R2: BufRead>(
        nodes: R1,
        nodes_path: &Path,
        rankedlineage: R2,
        lineage_path: &Path,
    ) -> Result<Self> {
        let mut parent_map = ParentMap::new();
        let mut rank_map = RankMap::new();
        let mut name_map = NameMap::new();

        for line in numbered_lines(nodes) {
            let (line_no, line) = line?;
            if line.trim().is_empty() {
                continue;
            }
            // tax_id | parent tax_id | rank | ...
            let parts = split_dmp_line(&line);
            if parts.len() < 3 {
                return Err(parse_error(
                    nodes_path,
                    line_no,
                    format!("expected at least 3 fields, found {}", parts.len()),
                ));
            }
            parent_map.insert(parts[0].to_string(), parts[1].to_string());
            rank_map.insert(parts[0].to_string(), parts[2].to_string());
        }

        for line in numbered_lines(rankedlineage) {
            let (line_no, line) = line?;
            if line.trim().is_empty() {
                continue;
            }
            // tax_id | tax_name | species | genus | ... | superkingdom
            let parts = split_dmp_line(&line);
            if parts.len() < 2 {
                return Err(parse_error(
                    lineage_path,
                    line_no,
                    format!("expected at least 2 fields, found {}", parts.len()),
                ));
            }
            if !parent_map.contains_key(parts[0]) {
                log::debug!("taxid {} listed in {} but not in nodes", parts[0], lineage_path.display());
                continue;
            }
            name_map.insert(parts[0].to_string(), parts[1].to_string());
        }

        Ok(Self::from_maps(parent_map, name_map, rank_map))
    }

    /// Load a flat taxDB file:
    /// ```text
    /// <taxid>\t<parentid>\t<taxname>\t<rank>
    /// ```
    pub fn from_taxdb<P: AsRef<Path>>(filepath: P) -> Result<Self> {
        let path = filepath.as_ref();
        let taxdump = Self::from_taxdb_reader(open_reader(path)?, path)?;
        log::info!("Loaded taxonomy with {} nodes from {}", taxdump.len(), path.display());
        Ok(taxdump)
    }

    pub fn from_taxdb_reader<R: BufRead>(reader: R, path: &Path) -> Result<Self> {
        let (parent_map, name_map, rank_map) = parse_taxdb(reader, path)?;
        Ok(Self::from_maps(parent_map, name_map, rank_map))
    }

    pub fn len(&self) -> usize {
        self.parent_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent_map.is_empty()
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Nodes from `taxid` (inclusive) up to the root.
    ///
    /// The walk ends at a self-parented node, at a parent link pointing
    /// outside the taxonomy, or when a cycle is detected.
    fn ancestors<'a>(&'a self, taxid: &str) -> Result<Vec<&'a str>> {
        let (mut current, _) = self
            .parent_map
            .get_key_value(taxid)
            .ok_or_else(|| Error::unknown(taxid))?;

        let mut chain = vec![current.as_str()];
        while let Some((parent, _)) = self
            .parent_map
            .get(current)
            .and_then(|p| self.parent_map.get_key_value(p))
        {
            if parent == current {
                break;
            }
            if chain.len() > self.parent_map.len() {
                log::warn!("cycle detected in taxonomy above taxid {}", taxid);
                break;
            }
            chain.push(parent.as_str());
            current = parent;
        }
        Ok(chain)
    }

    fn display(&self, taxid: &str, mode: LineageMode) -> String {
        match mode {
            LineageMode::Taxids => taxid.to_string(),
            LineageMode::Names => self
                .name_map
                .get(taxid)
                .cloned()
                .unwrap_or_else(|| taxid.to_string()),
        }
    }
}

impl TaxonomyStore for Taxdump {
    fn contains(&self, taxid: &str) -> bool {
        self.parent_map.contains_key(taxid)
    }

    fn rank(&self, taxid: &str) -> Result<&str> {
        self.rank_map
            .get(taxid)
            .map(String::as_str)
            .ok_or_else(|| Error::unknown(taxid))
    }

    fn name(&self, taxid: &str) -> Result<&str> {
        self.name_map
            .get(taxid)
            .map(String::as_str)
            .ok_or_else(|| Error::unknown(taxid))
    }

    fn lineage(
        &self,
        taxid: &str,
        ranks: Option<&[&str]>,
        mode: LineageMode,
        order: LineageOrder,
    ) -> Result<Vec<String>> {
        let chain = self.ancestors(taxid)?;

        let mut lineage: Vec<String> = match ranks {
            None => chain.iter().map(|t| self.display(t, mode)).collect(),
            Some(wanted) => {
                // Nearest ancestor wins if a rank occurs twice on the chain.
                let mut by_rank: AHashMap<&str, &str> = AHashMap::new();
                for &node in &chain {
                    if let Some(rank) = self.rank_map.get(node) {
                        by_rank.entry(rank.as_str()).or_insert(node);
                    }
                }
                wanted
                    .iter()
                    .map(|rank| match by_rank.get(rank) {
                        Some(node) => self.display(node, mode),
                        None => MISSING_RANK_PLACEHOLDER.to_string(),
                    })
                    .collect()
            }
        };

        if order == LineageOrder::RootToLeaf {
            lineage.reverse();
        }
        Ok(lineage)
    }

    fn lowest_common_ancestor(&self, taxids: &[&str]) -> Result<String> {
        if taxids.is_empty() {
            return Err(Error::EmptyTaxidSet);
        }

        let mut missing: Vec<String> = Vec::new();
        for &taxid in taxids {
            if !self.contains(taxid) && !missing.iter().any(|m| m == taxid) {
                missing.push(taxid.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(Error::UnknownTaxids(missing));
        }

        let mut first_chain = self.ancestors(taxids[0])?;
        first_chain.reverse();

        let others = taxids[1..]
            .iter()
            .map(|t| self.ancestors(t).map(|c| c.into_iter().collect::<AHashSet<&str>>()))
            .collect::<Result<Vec<_>>>()?;

        // Common ancestors form a prefix of the root-to-leaf chain; the last
        // node of that prefix is the LCA whichever taxid came first.
        let lca = first_chain
            .iter()
            .take_while(|node| others.iter().all(|set| set.contains(*node)))
            .last();

        match lca {
            Some(node) => Ok(node.to_string()),
            None => Err(Error::NoCommonAncestor(
                taxids.iter().map(|t| t.to_string()).collect(),
            )),
        }
    }

    fn is_descendant_of(&self, candidate: &str, parent: &str) -> Result<bool> {
        let missing: Vec<String> = [candidate, parent]
            .iter()
            .filter(|t| !self.contains(t))
            .map(|t| t.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::UnknownTaxids(missing));
        }

        Ok(self.ancestors(candidate)?.iter().skip(1).any(|&a| a == parent))
    }
}

/// Parses a taxDB stream in the format:
/// ```text
/// <taxid>\t<parentid>\t<taxname>\t<rank>
/// ```
/// Returns:
/// - a `ParentMap` mapping child_taxid -> parent_taxid
/// - a `NameMap` mapping taxid -> taxname
/// - a `RankMap` mapping taxid -> rank
pub fn parse_taxdb<R: BufRead>(reader: R, path: &Path) -> Result<(ParentMap, NameMap, RankMap)> {
    let mut parent_map = ParentMap::new();
    let mut name_map = NameMap::new();
    let mut rank_map = RankMap::new();

    for line in numbered_lines(reader) {
        let (line_no, line) = line?;
        if line.trim().is_empty() {
            continue;
        }
        // e.g. "2   1   Eukaryota   domain"
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 4 {
            return Err(parse_error(
                path,
                line_no,
                format!("expected 4 tab-separated fields, found {}", parts.len()),
            ));
        }

        let taxid = parts[0].trim().to_string();
        parent_map.insert(taxid.clone(), parts[1].trim().to_string());
        name_map.insert(taxid.clone(), parts[2].trim().to_string());
        rank_map.insert(taxid, parts[3].trim().to_string());
    }
    Ok((parent_map, name_map, rank_map))
}

/// Path placeholder for taxonomies parsed from memory.
pub fn in_memory_path() -> PathBuf {
    PathBuf::from("<memory>")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::taxonomy::CANONICAL_RANKS;
    use std::io::Cursor;

    /// A small eukaryote tree:
    ///
    /// ```text
    /// 1 root
    /// └─ 2759 Eukaryota (superkingdom)
    ///    └─ 33208 Metazoa (kingdom)
    ///       └─ 7711 Chordata (phylum)
    ///          └─ 40674 Mammalia (class)
    ///             ├─ 91561 Artiodactyla (order)
    ///             │  └─ 9895 Bovidae (family)
    ///             │     ├─ 9903 Bos (genus)
    ///             │     │  ├─ 9913 Bos taurus (species)
    ///             │     │  └─ 9915 Bos indicus (species)
    ///             │     └─ 9935 Ovis (genus)
    ///             │        └─ 9940 Ovis aries (species)
    ///             └─ 9989 Rodentia (order)
    ///                └─ 10066 Muridae (family)
    ///                   └─ 10090 Mus musculus (species, no genus node)
    /// ```
    pub(crate) const TEST_TAXDB: &str = "\
1\t1\troot\tno rank
2759\t1\tEukaryota\tsuperkingdom
33208\t2759\tMetazoa\tkingdom
7711\t33208\tChordata\tphylum
40674\t7711\tMammalia\tclass
91561\t40674\tArtiodactyla\torder
9895\t91561\tBovidae\tfamily
9903\t9895\tBos\tgenus
9913\t9903\tBos taurus\tspecies
9915\t9903\tBos indicus\tspecies
9935\t9895\tOvis\tgenus
9940\t9935\tOvis aries\tspecies
9989\t40674\tRodentia\torder
10066\t9989\tMuridae\tfamily
10090\t10066\tMus musculus\tspecies
";

    pub(crate) fn test_taxdump() -> Taxdump {
        Taxdump::from_taxdb_reader(Cursor::new(TEST_TAXDB), &in_memory_path()).unwrap()
    }

    #[test]
    fn parses_taxdb_lines() {
        let txd = test_taxdump();
        assert_eq!(txd.len(), 15);
        assert_eq!(txd.root(), Some("1"));
        assert_eq!(txd.name("9913").unwrap(), "Bos taurus");
        assert_eq!(txd.rank("9895").unwrap(), "family");
        assert!(txd.contains("10090"));
        assert!(!txd.contains("12345"));
    }

    #[test]
    fn short_taxdb_line_is_a_parse_error() {
        let err = Taxdump::from_taxdb_reader(Cursor::new("1\t1\troot\tno rank\n2\t1\n"), &in_memory_path())
            .unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parses_ncbi_dump_pair() {
        let nodes = "\
1\t|\t1\t|\tno rank\t|\t\t|
2\t|\t131567\t|\tsuperkingdom\t|\t\t|
131567\t|\t1\t|\tno rank\t|\t\t|
1224\t|\t2\t|\tphylum\t|\t\t|
";
        let lineage = "\
1\t|\troot\t|\t\t|\t\t|\t\t|\t\t|\t\t|\t\t|\t\t|\t\t|
2\t|\tBacteria\t|\t\t|\t\t|\t\t|\t\t|\t\t|\t\t|\t\t|\t\t|
1224\t|\tPseudomonadota\t|\t\t|\t\t|\t\t|\t\t|\t\t|\t\t|\t\t|\tBacteria\t|
";
        let txd = Taxdump::from_ncbi_readers(
            Cursor::new(nodes),
            Path::new("nodes.dmp"),
            Cursor::new(lineage),
            Path::new("rankedlineage.dmp"),
        )
        .unwrap();

        assert_eq!(txd.len(), 4);
        assert_eq!(txd.name("1224").unwrap(), "Pseudomonadota");
        assert_eq!(txd.rank("2").unwrap(), "superkingdom");
        // Not in rankedlineage.dmp: named after its taxid.
        assert_eq!(txd.name("131567").unwrap(), "131567");
        assert_eq!(
            txd.lineage("1224", None, LineageMode::Taxids, LineageOrder::LeafToRoot).unwrap(),
            vec!["1224", "2", "131567", "1"]
        );
    }

    #[test]
    fn unfiltered_lineage_in_both_directions() {
        let txd = test_taxdump();
        let up = txd
            .lineage("9903", None, LineageMode::Names, LineageOrder::LeafToRoot)
            .unwrap();
        assert_eq!(
            up,
            vec!["Bos", "Bovidae", "Artiodactyla", "Mammalia", "Chordata", "Metazoa", "Eukaryota", "root"]
        );
        let mut down = txd
            .lineage("9903", None, LineageMode::Names, LineageOrder::RootToLeaf)
            .unwrap();
        down.reverse();
        assert_eq!(down, up);
    }

    #[test]
    fn rank_filtered_lineage_fills_missing_ranks() {
        let txd = test_taxdump();
        let lineage = txd
            .lineage("10090", Some(&CANONICAL_RANKS[..]), LineageMode::Names, LineageOrder::LeafToRoot)
            .unwrap();
        assert_eq!(
            lineage,
            vec!["Mus musculus", MISSING_RANK_PLACEHOLDER, "Muridae", "Rodentia", "Mammalia", "Chordata", "Metazoa"]
        );

        let ids = txd
            .lineage("9895", Some(&CANONICAL_RANKS[..]), LineageMode::Taxids, LineageOrder::RootToLeaf)
            .unwrap();
        assert_eq!(
            ids,
            vec!["33208", "7711", "40674", "91561", "9895", MISSING_RANK_PLACEHOLDER, MISSING_RANK_PLACEHOLDER]
        );
    }

    #[test]
    fn lineage_of_unknown_taxid_is_lookup_miss() {
        let txd = test_taxdump();
        let err = txd
            .lineage("424242", None, LineageMode::Names, LineageOrder::LeafToRoot)
            .unwrap_err();
        assert!(err.is_lookup_miss());
    }

    #[test]
    fn lca_of_singleton_is_itself() {
        let txd = test_taxdump();
        assert_eq!(txd.lowest_common_ancestor(&["9913"]).unwrap(), "9913");
    }

    #[test]
    fn lca_of_ancestor_and_descendant_is_the_ancestor() {
        let txd = test_taxdump();
        assert_eq!(txd.lowest_common_ancestor(&["9903", "9913"]).unwrap(), "9903");
    }

    #[test]
    fn lca_with_root_is_root() {
        let txd = test_taxdump();
        assert_eq!(txd.lowest_common_ancestor(&["9913", "1", "10090"]).unwrap(), "1");
    }

    #[test]
    fn lca_is_order_independent() {
        let txd = test_taxdump();
        let sets: [&[&str]; 6] = [
            &["9913", "9915", "9940"],
            &["9913", "9940", "9915"],
            &["9915", "9913", "9940"],
            &["9915", "9940", "9913"],
            &["9940", "9913", "9915"],
            &["9940", "9915", "9913"],
        ];
        for set in sets {
            assert_eq!(txd.lowest_common_ancestor(set).unwrap(), "9895");
        }
        assert_eq!(txd.lowest_common_ancestor(&["10090", "9940"]).unwrap(), "40674");
        assert_eq!(txd.lowest_common_ancestor(&["9940", "10090"]).unwrap(), "40674");
    }

    #[test]
    fn lca_reports_every_missing_taxid() {
        let txd = test_taxdump();
        match txd.lowest_common_ancestor(&["9913", "111", "222", "111"]) {
            Err(Error::UnknownTaxids(missing)) => assert_eq!(missing, vec!["111", "222"]),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(txd.lowest_common_ancestor(&[]), Err(Error::EmptyTaxidSet)));
    }

    #[test]
    fn descendant_test_is_strict() {
        let txd = test_taxdump();
        assert!(txd.is_descendant_of("9913", "9895").unwrap());
        assert!(txd.is_descendant_of("9913", "1").unwrap());
        assert!(!txd.is_descendant_of("9913", "9913").unwrap());
        assert!(!txd.is_descendant_of("9895", "9913").unwrap());
        assert!(!txd.is_descendant_of("10090", "91561").unwrap());
        assert!(txd.is_descendant_of("9913", "999").unwrap_err().is_lookup_miss());
        assert!(txd.is_descendant_of("999", "1").unwrap_err().is_lookup_miss());
    }
}
