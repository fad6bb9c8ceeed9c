// Prompts for cover letter generation.
// The word target is interpolated; everything else is fixed.

use crate::llm_client::prompts::PLAIN_TEXT_ONLY;

pub const NO_COMPANY_INFO: &str =
    "No additional company information was provided. Do not invent facts about the company.";

pub fn letter_system_prompt(word_limit: u32) -> String {
    format!(
        "You are an expert cover letter writer with experience in HR and recruitment.
Your task is to create a personalized, professional cover letter based on the provided CV/resume,
job description, and company information. Follow these guidelines:

1. Use a professional business letter format.
2. Personalize the letter for the specific job and company.
3. Highlight relevant skills and experiences from the CV that match the job requirements.
4. Keep the tone professional but conversational.
5. Be concise - aim for about {word_limit} words.
6. Include a strong opening paragraph, 2-3 body paragraphs, and a closing paragraph.
7. Don't include the date or physical addresses.

Begin with \"Dear Hiring Manager,\" unless a specific name is provided.
End with \"Sincerely,\" followed by a placeholder for the applicant's name.

{PLAIN_TEXT_ONLY}"
    )
}

pub fn letter_user_prompt(resume_text: &str, job_description: &str, company_info: Option<&str>) -> String {
    let company_info = company_info.unwrap_or(NO_COMPANY_INFO);
    format!(
        "Generate a personalized cover letter based on the following information:

CV/RESUME INFORMATION:
{resume_text}

JOB DESCRIPTION:
{job_description}

COMPANY INFORMATION:
{company_info}

Please write a tailored cover letter that highlights the relevant skills and experiences from my CV
that match the job requirements, while also showing knowledge of and enthusiasm for the company."
    )
}
