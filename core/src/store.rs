//! The in-memory recipe list and the four ways to change it.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::AuthState;
use crate::drive::RemoteStore;
use crate::models::Recipe;
use crate::resolver::ImageResolver;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetRecipes(Vec<Recipe>),
    AddRecipe(Recipe),
    EditRecipe(Recipe),
    DeleteRecipe(String),
}

/// Apply `action` to `recipes`. Returns false when the list is unchanged
/// (edit or delete of an unknown id).
pub fn reduce(recipes: &mut Vec<Recipe>, action: Action) -> bool {
    match action {
        Action::SetRecipes(list) => {
            *recipes = list;
            true
        }
        Action::AddRecipe(recipe) => {
            recipes.push(recipe);
            true
        }
        Action::EditRecipe(recipe) => match recipes.iter_mut().find(|r| r.id == recipe.id) {
            Some(slot) => {
                *slot = recipe;
                true
            }
            None => false,
        },
        Action::DeleteRecipe(id) => match recipes.iter().position(|r| r.id == id) {
            Some(idx) => {
                recipes.remove(idx);
                true
            }
            None => false,
        },
    }
}

/// Shared handle to the recipe list. Cloning is cheap; all clones see the same
/// list.
pub struct RecipeStore<R> {
    inner: Arc<Inner<R>>,
}

struct Inner<R> {
    recipes: watch::Sender<Vec<Recipe>>,
    resolver: Arc<ImageResolver<R>>,
    auth: AuthState,
}

impl<R> Clone for RecipeStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: RemoteStore> RecipeStore<R> {
    pub fn new(resolver: Arc<ImageResolver<R>>, auth: AuthState) -> Self {
        let (recipes, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                recipes,
                resolver,
                auth,
            }),
        }
    }

    #[must_use]
    pub fn recipes(&self) -> Vec<Recipe> {
        self.inner.recipes.borrow().clone()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Recipe> {
        self.inner
            .recipes
            .borrow()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.recipes.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receiver notified after every mutation that changed the list.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Recipe>> {
        self.inner.recipes.subscribe()
    }

    #[must_use]
    pub fn resolver(&self) -> &ImageResolver<R> {
        &self.inner.resolver
    }

    /// Upload any local images, then append. Offline, images stay local.
    pub async fn add_recipe(&self, recipe: Recipe) -> Recipe {
        let recipe = self.resolve_images(recipe).await;
        self.dispatch(Action::AddRecipe(recipe.clone()));
        recipe
    }

    /// Upload any local images, then replace the recipe with the same id.
    /// Returns `None` when no recipe has that id.
    pub async fn edit_recipe(&self, recipe: Recipe) -> Option<Recipe> {
        let recipe = self.resolve_images(recipe).await;
        self.dispatch(Action::EditRecipe(recipe.clone()))
            .then_some(recipe)
    }

    pub fn delete_recipe(&self, id: &str) -> bool {
        self.dispatch(Action::DeleteRecipe(id.to_string()))
    }

    pub fn set_recipes(&self, recipes: Vec<Recipe>) {
        self.dispatch(Action::SetRecipes(recipes));
    }

    fn dispatch(&self, action: Action) -> bool {
        self.inner
            .recipes
            .send_if_modified(|recipes| reduce(recipes, action))
    }

    async fn resolve_images(&self, recipe: Recipe) -> Recipe {
        let token = self.inner.auth.token();
        self.inner
            .resolver
            .resolve_recipe(recipe, token.as_deref())
            .await
    }
}
