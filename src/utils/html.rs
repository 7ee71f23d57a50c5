/// Clean user-authored rich text using the ammonia library.
///
/// Question and option text is entered by teachers and rendered back to
/// students, so it goes through whitelist-based sanitization: safe tags
/// (like <b>, <p>) survive, dangerous tags (like <script>, <iframe>) and
/// event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
