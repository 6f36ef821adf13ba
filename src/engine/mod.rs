/// Translation engine
///
/// Everything downstream of matching lives here:
///
/// 1. **Disambiguation** - picks the sense of multi-sense terms from context embeddings
/// 2. **Substitution** - splices glosses (or slang realizations) into the input
/// 3. **Grammar & quality** - polishes the output and scores it
/// 4. **Reverse realization** - rewrites plain-language concepts as slang
/// 5. **Orchestrator** - [`SlangEngine`], which runs both pipelines against the served lexicon
///
/// External collaborators sit behind traits: [`EmbeddingProvider`] for vectors and
/// [`UnknownTermSink`] for unmatched words.
pub mod disambiguation;
pub mod embedding;
pub mod grammar;
pub mod mock;
pub mod orchestrator;
pub mod quality;
pub mod result;
pub mod reverse;
pub mod substitute;
pub mod unknown_terms;


pub use disambiguation::{Disambiguator, Resolution, context_window};
pub use embedding::{
    DisabledEmbeddings, EmbeddingProvider, HttpEmbeddingProvider, cosine_similarity,
    embed_with_timeout,
};
pub use grammar::{GrammarOutput, count_violations, rewrite};
pub use mock::{MockEmbedder, MockMode};
pub use orchestrator::{SlangEngine, Stage, decode_input, validate_input};
pub use quality::{QualityAssessor, fluency, polish_recommended};
pub use result::{
    Degradation, Density, Direction, DisambiguationFailure, QualityMetrics, RenderMode,
    SlangConfig, SpanAnnotation, TranslationResult,
};
pub use reverse::{ConceptSpan, Realization, find_concepts, realizations, realize};
pub use unknown_terms::{
    ChannelUnknownTermSink, MemoryUnknownTermLog, TracingUnknownTermSink, UnknownTerm,
    UnknownTermSink, collect_unknown, spawn_jsonl_writer,
};
