//! Category service lookups.

use super::service::EntityService;
use crate::shared::models::Category;

pub type CategoryService = EntityService<Category>;

impl EntityService<Category> {
    /// Case-insensitive lookup by name
    pub fn find_by_name(&self, name: &str) -> Option<Category> {
        let name = name.trim().to_lowercase();
        self.all()
            .iter()
            .find(|category| category.name.to_lowercase() == name)
            .cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.find_by_name(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.all().iter().map(|category| category.name.clone()).collect()
    }
}
