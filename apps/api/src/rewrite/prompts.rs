// All LLM prompt constants for the Rewrite module.
// Reuses cross-cutting fragments from llm_client::prompts via {slots}.

/// System prompt shared by section rewrites and cover letters.
pub const REWRITE_SYSTEM: &str = "\
    You are an expert resume editor and career strategist. \
    You tailor existing application materials to a target role. \
    Write in a professional, plain and concise register: short bullets, concrete results, \
    numbers where the source material supports them. \
    Reuse and adapt what the candidate already wrote; never invent employers, titles, \
    dates, degrees or metrics that the provided material does not support. \
    Keep keywords from the job description where they honestly apply.";

/// Task prompt for rewriting a single resume section.
/// Slots: {section_name}, {full_context}, {section_content},
/// {latex_instruction}, {output_instruction}
pub const SECTION_REWRITE_PROMPT_TEMPLATE: &str = "\
Rewrite one section of a resume so it targets the role described in the context.

Section: {section_name}

Context (job description and supporting material):
<context>
{full_context}
</context>

Original section:
<section>
{section_content}
</section>

Instructions:
1. Identify what the target role needs from the context.
2. Keep relevant content from the original section, tighten the wording, drop what is irrelevant.
3. Add content only when the context material supports it.
4. Keep the same markup conventions as the original section (same list environments and commands).
5. {latex_instruction}
6. {output_instruction}

Rewritten section:";

/// Task prompt for a cover letter.
/// Slots: {resume_text}, {full_context}, {output_instruction}
pub const COVER_LETTER_PROMPT_TEMPLATE: &str = "\
Write a cover letter for the candidate below, addressed to the role described in the context.

Candidate resume:
<resume>
{resume_text}
</resume>

Context (job description and supporting material):
<context>
{full_context}
</context>

Instructions:
1. One page at most: a short opening, two or three achievements that match the role, a closing call to action.
2. Connect the candidate's background directly to the stated requirements.
3. Professional, direct tone; no filler.
4. {output_instruction}

Cover letter:";

/// Returned by the identity backend, which never calls an LLM.
pub const DEFAULT_COVER_LETTER: &str = "Dear Hiring Manager,\n\n\
I am writing to express my interest in the position. \
Please find my resume attached for your consideration.\n\n\
Best regards,\n[Your Name]";

/// Task prompt for typesetting a plain-text resume into a LaTeX template.
/// Slots: {template_content}, {resume_text}
pub const LATEX_GENERATION_PROMPT_TEMPLATE: &str = "\
Fill the LaTeX template below with the candidate's resume.

Template:
<template>
{template_content}
</template>

Resume text:
<resume>
{resume_text}
</resume>

Instructions:
1. Keep the template's preamble, commands and layout; replace its placeholder content with the resume's.
2. Map each part of the resume to the matching template section; drop template sections the resume has no material for.
3. Escape LaTeX special characters in the resume text (& % $ # _ { }).
4. Every \\begin{...} must have its matching \\end{...} and every brace must be balanced.
5. Return ONLY the complete LaTeX document, from \\documentclass to \\end{document}. \
Do NOT wrap it in markdown code fences.

LaTeX document:";

/// Used when a PDF resume is converted without an uploaded template.
pub const DEFAULT_LATEX_TEMPLATE: &str = r"\documentclass[11pt]{article}
\usepackage[margin=0.75in]{geometry}
\usepackage{enumitem}
\usepackage[hidelinks]{hyperref}
\setlength{\parindent}{0pt}
\setlist{nosep,leftmargin=*}

\begin{document}

\begin{center}
  {\Large\textbf{Full Name}} \\
  email@example.com $\cdot$ +1 555 0100 $\cdot$ City, Country
\end{center}

\section*{Summary}
One or two sentences about the candidate.

\section*{Experience}
\textbf{Job Title}, Company \hfill Start -- End
\begin{itemize}
  \item Achievement with a concrete result.
\end{itemize}

\section*{Projects}
\textbf{Project Name} \hfill Year
\begin{itemize}
  \item What was built and with which tools.
\end{itemize}

\section*{Education}
\textbf{Degree}, Institution \hfill Year

\section*{Skills}
Languages, frameworks, tools.

\end{document}
";
