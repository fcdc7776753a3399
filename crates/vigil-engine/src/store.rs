use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use vigil_model::{
    Engagement, EngagementId, Finding, FindingHash, FindingId, Product, ProductId, ScanType,
    Severity, Tags, Test, TestId,
};

use crate::error::{EngineError, EngineResult};

/// A finding as stored, wrapped with the metadata the pipeline adds.
#[derive(Clone, Debug, Serialize)]
pub struct StoredFinding {
    pub id: FindingId,
    pub test_id: TestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_code: Option<FindingHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<FindingId>,
    #[serde(flatten)]
    pub finding: Finding,
}

/// Which pipeline produced an import history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Import,
    Reimport,
}

impl ImportKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            ImportKind::Import => "import",
            ImportKind::Reimport => "reimport",
        }
    }
}

/// Finding counts of one import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStatistics {
    pub created: u32,
    pub reactivated: u32,
    pub closed: u32,
    pub untouched: u32,
}

/// One line of the import audit trail of a test.
#[derive(Clone, Debug, Serialize)]
pub struct ImportHistory {
    pub id: u64,
    pub test_id: TestId,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub kind: ImportKind,
    #[serde(flatten)]
    pub statistics: ImportStatistics,
}

/// Finding query; unset members match everything.
///
/// `product`, `engagement` and `test` narrow the hierarchy, the most
/// specific one wins.
#[derive(Clone, Debug, Default)]
pub struct FindingFilter {
    pub product: Option<ProductId>,
    pub engagement: Option<EngagementId>,
    pub test: Option<TestId>,
    pub severity: Option<Severity>,
    pub active: Option<bool>,
    pub duplicate: Option<bool>,
    pub tag: Option<String>,
}

/// Hierarchy context a finding or test sits in.
#[derive(Clone, Debug)]
pub struct FindingContext {
    pub test: Test,
    pub engagement: Engagement,
    pub product_id: ProductId,
}

/// In-memory store for the product / engagement / test / finding tree.
///
/// Ids are handed out from 1 per entity kind and never reused. All maps
/// are keyed by id, so iteration yields oldest first.
pub struct FindingStore {
    products: RwLock<BTreeMap<ProductId, Product>>,
    engagements: RwLock<BTreeMap<EngagementId, Engagement>>,
    tests: RwLock<BTreeMap<TestId, Test>>,
    findings: RwLock<BTreeMap<FindingId, StoredFinding>>,
    history: RwLock<Vec<ImportHistory>>,
    product_seq: AtomicU64,
    engagement_seq: AtomicU64,
    test_seq: AtomicU64,
    finding_seq: AtomicU64,
    history_seq: AtomicU64,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Default for FindingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FindingStore {
    pub fn new() -> Self {
        Self {
            products: RwLock::new(BTreeMap::new()),
            engagements: RwLock::new(BTreeMap::new()),
            tests: RwLock::new(BTreeMap::new()),
            findings: RwLock::new(BTreeMap::new()),
            history: RwLock::new(Vec::new()),
            product_seq: AtomicU64::new(1),
            engagement_seq: AtomicU64::new(1),
            test_seq: AtomicU64::new(1),
            finding_seq: AtomicU64::new(1),
            history_seq: AtomicU64::new(1),
        }
    }

    fn next(seq: &AtomicU64) -> u64 {
        seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn create_product(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        tags: Tags,
    ) -> EngineResult<Product> {
        let name = name.into();
        let mut products = write(&self.products);
        if products.values().any(|p| p.name == name) {
            return Err(EngineError::DuplicateProduct(name));
        }
        let product = Product {
            id: ProductId(Self::next(&self.product_seq)),
            name,
            description,
            tags,
        };
        products.insert(product.id, product.clone());
        Ok(product)
    }

    pub fn product(&self, id: ProductId) -> Option<Product> {
        read(&self.products).get(&id).cloned()
    }

    pub fn product_by_name(&self, name: &str) -> Option<Product> {
        read(&self.products).values().find(|p| p.name == name).cloned()
    }

    pub fn products(&self) -> Vec<Product> {
        read(&self.products).values().cloned().collect()
    }

    /// Remove a product and everything under it.
    pub fn delete_product(&self, id: ProductId) -> EngineResult<()> {
        if write(&self.products).remove(&id).is_none() {
            return Err(EngineError::ProductNotFound(id.to_string()));
        }
        let doomed: Vec<EngagementId> = read(&self.engagements)
            .values()
            .filter(|e| e.product_id == id)
            .map(|e| e.id)
            .collect();
        for engagement_id in doomed {
            self.remove_engagement_tree(engagement_id);
        }
        Ok(())
    }

    pub fn create_engagement(
        &self,
        product_id: ProductId,
        name: impl Into<String>,
        deduplication_on_engagement: bool,
        target_start: Option<Date>,
        target_end: Option<Date>,
        tags: Tags,
    ) -> EngineResult<Engagement> {
        if self.product(product_id).is_none() {
            return Err(EngineError::ProductNotFound(product_id.to_string()));
        }
        let engagement = Engagement {
            id: EngagementId(Self::next(&self.engagement_seq)),
            product_id,
            name: name.into(),
            target_start,
            target_end,
            deduplication_on_engagement,
            tags,
        };
        write(&self.engagements).insert(engagement.id, engagement.clone());
        Ok(engagement)
    }

    pub fn engagement(&self, id: EngagementId) -> Option<Engagement> {
        read(&self.engagements).get(&id).cloned()
    }

    /// Oldest engagement with this name under the product.
    pub fn engagement_by_name(&self, product_id: ProductId, name: &str) -> Option<Engagement> {
        read(&self.engagements)
            .values()
            .find(|e| e.product_id == product_id && e.name == name)
            .cloned()
    }

    pub fn engagements(&self, product: Option<ProductId>) -> Vec<Engagement> {
        read(&self.engagements)
            .values()
            .filter(|e| product.is_none_or(|p| e.product_id == p))
            .cloned()
            .collect()
    }

    /// Remove an engagement and everything under it.
    pub fn delete_engagement(&self, id: EngagementId) -> EngineResult<()> {
        if !read(&self.engagements).contains_key(&id) {
            return Err(EngineError::EngagementNotFound(id.to_string()));
        }
        self.remove_engagement_tree(id);
        Ok(())
    }

    fn remove_engagement_tree(&self, id: EngagementId) {
        write(&self.engagements).remove(&id);
        let doomed: Vec<TestId> = read(&self.tests)
            .values()
            .filter(|t| t.engagement_id == id)
            .map(|t| t.id)
            .collect();
        for test_id in doomed {
            self.remove_test_tree(test_id);
        }
    }

    fn remove_test_tree(&self, id: TestId) {
        write(&self.tests).remove(&id);
        write(&self.findings).retain(|_, f| f.test_id != id);
        write(&self.history).retain(|h| h.test_id != id);
    }

    pub fn create_test(
        &self,
        engagement_id: EngagementId,
        scan_type: impl Into<ScanType>,
        title: Option<String>,
        tags: Tags,
    ) -> EngineResult<Test> {
        if self.engagement(engagement_id).is_none() {
            return Err(EngineError::EngagementNotFound(engagement_id.to_string()));
        }
        let test = Test {
            id: TestId(Self::next(&self.test_seq)),
            engagement_id,
            scan_type: scan_type.into(),
            title,
            created: OffsetDateTime::now_utc(),
            tags,
        };
        write(&self.tests).insert(test.id, test.clone());
        Ok(test)
    }

    pub fn test(&self, id: TestId) -> Option<Test> {
        read(&self.tests).get(&id).cloned()
    }

    pub fn tests(&self, engagement: Option<EngagementId>) -> Vec<Test> {
        read(&self.tests)
            .values()
            .filter(|t| engagement.is_none_or(|e| t.engagement_id == e))
            .cloned()
            .collect()
    }

    /// Engagement and product a test belongs to.
    pub fn context_of_test(&self, test_id: TestId) -> Option<FindingContext> {
        let test = self.test(test_id)?;
        let engagement = self.engagement(test.engagement_id)?;
        let product_id = engagement.product_id;
        Some(FindingContext {
            test,
            engagement,
            product_id,
        })
    }

    pub fn insert_finding(
        &self,
        test_id: TestId,
        finding: Finding,
        hash_code: Option<FindingHash>,
    ) -> EngineResult<StoredFinding> {
        if self.test(test_id).is_none() {
            return Err(EngineError::TestNotFound(test_id));
        }
        let stored = StoredFinding {
            id: FindingId(Self::next(&self.finding_seq)),
            test_id,
            hash_code,
            duplicate_of: None,
            finding,
        };
        write(&self.findings).insert(stored.id, stored.clone());
        Ok(stored)
    }

    pub fn finding(&self, id: FindingId) -> Option<StoredFinding> {
        read(&self.findings).get(&id).cloned()
    }

    /// Mutate one finding in place and return the updated copy.
    pub fn update_finding<F>(&self, id: FindingId, mutate: F) -> EngineResult<StoredFinding>
    where
        F: FnOnce(&mut StoredFinding),
    {
        let mut findings = write(&self.findings);
        let Some(stored) = findings.get_mut(&id) else {
            return Err(EngineError::FindingNotFound(id));
        };
        mutate(stored);
        Ok(stored.clone())
    }

    /// Findings matching the filter, oldest first.
    pub fn findings(&self, filter: &FindingFilter) -> Vec<StoredFinding> {
        let test_scope: Option<HashSet<TestId>> =
            match (filter.test, filter.engagement, filter.product) {
                (Some(test), _, _) => Some([test].into()),
                (None, Some(engagement), _) => {
                    Some(self.tests(Some(engagement)).iter().map(|t| t.id).collect())
                }
                (None, None, Some(product)) => {
                    let engagements: HashSet<EngagementId> = read(&self.engagements)
                        .values()
                        .filter(|e| e.product_id == product)
                        .map(|e| e.id)
                        .collect();
                    Some(
                        read(&self.tests)
                            .values()
                            .filter(|t| engagements.contains(&t.engagement_id))
                            .map(|t| t.id)
                            .collect(),
                    )
                }
                (None, None, None) => None,
            };

        read(&self.findings)
            .values()
            .filter(|f| test_scope.as_ref().is_none_or(|scope| scope.contains(&f.test_id)))
            .filter(|f| filter.severity.is_none_or(|s| f.finding.severity == s))
            .filter(|f| filter.active.is_none_or(|a| f.finding.active == a))
            .filter(|f| filter.duplicate.is_none_or(|d| f.finding.duplicate == d))
            .filter(|f| filter.tag.as_deref().is_none_or(|t| f.finding.tags.contains(t)))
            .cloned()
            .collect()
    }

    pub fn findings_of_test(&self, test_id: TestId) -> Vec<StoredFinding> {
        read(&self.findings)
            .values()
            .filter(|f| f.test_id == test_id)
            .cloned()
            .collect()
    }

    /// Ids of the findings marked duplicate of the given one.
    pub fn duplicates_of(&self, id: FindingId) -> Vec<FindingId> {
        read(&self.findings)
            .values()
            .filter(|f| f.duplicate_of == Some(id))
            .map(|f| f.id)
            .collect()
    }

    pub fn record_history(
        &self,
        test_id: TestId,
        kind: ImportKind,
        statistics: ImportStatistics,
    ) -> ImportHistory {
        let entry = ImportHistory {
            id: Self::next(&self.history_seq),
            test_id,
            timestamp: OffsetDateTime::now_utc(),
            kind,
            statistics,
        };
        write(&self.history).push(entry.clone());
        entry
    }

    pub fn history(&self, test: Option<TestId>) -> Vec<ImportHistory> {
        read(&self.history)
            .iter()
            .filter(|h| test.is_none_or(|t| h.test_id == t))
            .cloned()
            .collect()
    }
}
