/// The fixed instruction sent verbatim with every image.
pub const ANALYSIS_QUERY: &str = "\
Analyze this medical image as a highly skilled medical imaging expert with extensive knowledge in radiology and diagnostic imaging. Follow this structure:

1. Image Type & Region Analysis:
* Identify the imaging modality used (X-ray/MRI/CT/Ultrasound/etc.)
* Describe the anatomical region shown and patient positioning
* Assess image quality and technical adequacy

2. Key Findings Analysis:
* Describe all primary observations in detail
* Document any abnormalities with precise descriptions
* Note relevant measurements and densities
* Specify locations, sizes, shapes, and key characteristics
* Indicate severity level (Normal/Mild/Moderate/Severe)

3. Diagnostic Assessment:
* State your primary diagnosis and confidence level
* List potential differential diagnoses in order of likelihood
* Provide evidence from the image supporting each diagnosis
* Highlight any urgent or critical findings requiring immediate attention

4. Patient-Friendly Summary:
* Explain the findings in clear, simple language
* Define any necessary medical terms
* Use helpful analogies where appropriate
* Address likely patient concerns

5. Research Context:
* Search recent medical literature for similar cases using web search
* Find relevant treatment protocols
* Identify recent technological advances in this area
* Provide 2-3 key medical references supporting your analysis

Please provide a comprehensive analysis covering ALL sections above.";

/// Appended after the query to push the model towards covering every section.
pub const SECTION_REMINDER: &str =
    "\n\nIMPORTANT: Please ensure you address ALL sections (1-5) in your analysis.";

/// System instruction asking for markdown formatted answers.
pub const MARKDOWN_INSTRUCTION: &str = "Use markdown to format your answers.";

/// Number of numbered sections the query asks for.
pub const SECTION_COUNT: usize = 5;

/// Builds the full text sent alongside the image.
pub fn analysis_prompt() -> String {
    let mut prompt = String::with_capacity(ANALYSIS_QUERY.len() + SECTION_REMINDER.len());
    prompt.push_str(ANALYSIS_QUERY);
    prompt.push_str(SECTION_REMINDER);
    prompt
}
