use serde::{Deserialize, Serialize};

/// Kind of content the generator is asked to produce.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Lesson,
    Story,
    Dialogue,
    Review,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Lesson => "lesson",
            GenerationMode::Story => "story",
            GenerationMode::Dialogue => "dialogue",
            GenerationMode::Review => "review",
        }
    }
}

impl core::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

/// What a single unit of content should be about.
///
/// Seeds live inside the owning record (a path slot or a group target) and are
/// turned into a [`GenerationBrief`] right before the generator is called.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentSeed {
    pub theme: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub objectives: Vec<String>,
}

impl ContentSeed {
    pub fn new(theme: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            theme: theme.into(),
            difficulty,
            objectives: Vec::new(),
        }
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objectives.push(objective.into());
        self
    }
}

/// Input to the content generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationBrief {
    pub brief: String,
    pub mode: GenerationMode,
    pub language_hint: String,
}

/// Prompt construction seam.
///
/// Implementations are pure: same seed, mode and language always yield the same brief.
pub trait BriefBuilder: Send + Sync {
    fn build(&self, seed: &ContentSeed, mode: GenerationMode, language: &str) -> GenerationBrief;
}

/// Plain-text brief builder used when no richer prompt library is plugged in.
#[derive(Debug, Default, Copy, Clone)]
pub struct TemplateBriefBuilder;

impl BriefBuilder for TemplateBriefBuilder {
    fn build(&self, seed: &ContentSeed, mode: GenerationMode, language: &str) -> GenerationBrief {
        let mut brief = format!(
            "Write a {} {} for {} learners about \"{}\".",
            seed.difficulty.as_str(),
            mode.as_str(),
            language,
            seed.theme.trim()
        );

        if !seed.objectives.is_empty() {
            brief.push_str("\nLearning objectives:");
            for objective in &seed.objectives {
                brief.push_str("\n- ");
                brief.push_str(objective.trim());
            }
        }

        brief.push_str("\nRespond with a JSON object containing at least \"title\" and \"description\".");

        GenerationBrief {
            brief,
            mode,
            language_hint: language.to_string(),
        }
    }
}
