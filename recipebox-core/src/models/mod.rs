mod collection;
mod group;
mod image_state;
mod ingredient;
mod nutrition;
mod recipe;

pub use collection::Collection;
pub use group::Group;
pub use image_state::ImageState;
pub use ingredient::Ingredient;
pub use nutrition::Nutrition;
pub use recipe::Recipe;
