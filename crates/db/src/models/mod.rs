pub mod milestone;
pub mod pagination;
pub mod project;
pub mod project_image;
pub mod project_member;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;
