pub(crate) mod documents;
pub(crate) mod extraction;
pub(crate) mod provider;
pub(crate) mod quiz_generation;
pub(crate) mod quiz_grading;
