/*!
 * Resource model.
 *
 * - `code`: inline codes (tags, placeholders) kept outside the text
 * - `fragment`: coded text, i.e. text with marker pairs pointing at codes
 * - `container`: a fragment optionally split into segments and spacers
 * - `skeleton`: the non-translatable parts of a document
 * - `model`: the resources carried by events
 * - `annotation`: typed annotations attached to resources
 * - `id_generator`: reproducible ids for generated resources
 */

pub mod annotation;
pub mod code;
pub mod container;
pub mod fragment;
pub mod id_generator;
pub mod model;
pub mod skeleton;
