//! HTML for every page. Everything user-controlled goes through
//! [`html_escape`] before it reaches the markup.

use crate::accounts::Flash;
use crate::game::{BaseItem, Item, ItemCategory, ItemId, SlotBonus};

use super::forms::{playing_choices, FormErrors};
use super::views::{
    CreatePage, DetailPage, EditPage, InventoryPage, LoginPage, Page, RosterPage, SettingsPage,
};

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn layout(title: &str, user: Option<&str>, flashes: &[Flash], body: &str) -> String {
    let nav = match user {
        Some(username) => format!(
            "<nav><a href=\"/characters\">Characters</a> | <a href=\"/inventory\">Inventory</a> | \
<a href=\"/settings\">Settings</a> | <span>{}</span> \
<form method=\"post\" action=\"/logout\" class=\"inline\"><button type=\"submit\">Log out</button></form></nav>",
            html_escape(username)
        ),
        None => "<nav><a href=\"/login\">Log in</a></nav>".to_string(),
    };
    let mut notices = String::new();
    for flash in flashes {
        notices.push_str(&format!(
            "<div class=\"alert alert-{}\">{}</div>",
            flash.level.css_class(),
            html_escape(&flash.message)
        ));
    }
    format!(
        "<!doctype html>\
<html><head><meta charset=\"utf-8\"><title>{} - Roster</title></head>\
<body>{}{}<main>{}</main></body></html>",
        html_escape(title),
        nav,
        notices,
        body
    )
}

fn field_error(errors: &FormErrors, field: &str) -> String {
    match errors.get(field) {
        Some(message) => format!("<span class=\"error\">{}</span>", html_escape(message)),
        None => String::new(),
    }
}

fn option(value: &str, label: &str, selected: bool) -> String {
    format!(
        "<option value=\"{}\"{}>{}</option>",
        html_escape(value),
        if selected { " selected" } else { "" },
        html_escape(label)
    )
}

/// Full HTML document for `page`.
pub fn render_page(page: &Page, user: Option<&str>, flashes: &[Flash]) -> String {
    let (title, body) = match page {
        Page::Login(p) => ("Log in", render_login(p)),
        Page::Roster(p) => ("Characters", render_roster(p)),
        Page::CreateCharacter(p) => ("New character", render_create(p)),
        Page::CharacterDetail(p) => ("Character", render_detail(p)),
        Page::EditCharacter(p) => ("Edit character", render_edit(p)),
        Page::Inventory(p) => ("Inventory", render_inventory(p)),
        Page::Settings(p) => ("Settings", render_settings(p)),
    };
    layout(title, user, flashes, &body)
}

/// Minimal page for 403/404/500 responses.
pub fn render_error(title: &str, message: &str, user: Option<&str>) -> String {
    layout(
        title,
        user,
        &[],
        &format!(
            "<h1>{}</h1><p>{}</p><p><a href=\"/characters\">Back to your characters</a></p>",
            html_escape(title),
            html_escape(message)
        ),
    )
}

fn render_login(p: &LoginPage) -> String {
    let next = match &p.next {
        Some(next) => format!(
            "<input type=\"hidden\" name=\"next\" value=\"{}\">",
            html_escape(next)
        ),
        None => String::new(),
    };
    format!(
        "<h1>Log in</h1>\
<form method=\"post\" action=\"/login\">{}\
<label>Username <input name=\"username\" value=\"{}\" required></label>\
<label>Password <input type=\"password\" name=\"password\" required></label>\
<button type=\"submit\">Log in</button></form>",
        next,
        html_escape(&p.username)
    )
}

fn render_roster(p: &RosterPage) -> String {
    let mut s = String::from("<h1>Your characters</h1>");
    if p.characters.is_empty() {
        s.push_str("<p>You have no characters yet.</p>");
    } else {
        s.push_str("<table><tr><th>Name</th><th>Level</th><th></th></tr>");
        for c in &p.characters {
            let playing = if p.config.playing == Some(c.id) {
                " <em>(playing)</em>"
            } else {
                ""
            };
            s.push_str(&format!(
                "<tr><td><a href=\"/characters/{id}\">{name}</a>{playing}</td><td>{level}</td>\
<td><form method=\"post\" action=\"/characters/{id}/select\"><button type=\"submit\">Play</button></form></td></tr>",
                id = c.id,
                name = html_escape(&c.name),
                playing = playing,
                level = c.stats.level
            ));
        }
        s.push_str("</table>");
    }
    s.push_str(&format!(
        "<p>{} of {} character slots used.</p>",
        p.characters.len(),
        p.max_characters
    ));
    if p.characters.len() < p.max_characters {
        s.push_str("<p><a href=\"/characters/new\">Create a character</a></p>");
    }
    s
}

fn render_create(p: &CreatePage) -> String {
    let mut species = option("", "(select)", p.form.species.is_empty());
    for sp in &p.species {
        let id = sp.id.to_string();
        species.push_str(&option(&id, &sp.name, p.form.species == id));
    }
    let mut genders = option("", "(none)", p.form.gender.is_empty());
    for g in &p.genders {
        let id = g.id.to_string();
        genders.push_str(&option(&id, &g.name, p.form.gender == id));
    }
    format!(
        "<h1>New character</h1>\
<form method=\"post\" action=\"/characters/new\">\
<label>Name <input name=\"name\" value=\"{}\" required></label>{}\
<label>Species <select name=\"species\">{}</select></label>{}\
<label>Gender <select name=\"gender\">{}</select></label>{}\
<button type=\"submit\">Create</button></form>\
<p><a href=\"/characters\">Cancel</a></p>",
        html_escape(&p.form.name),
        field_error(&p.errors, "name"),
        species,
        field_error(&p.errors, "species"),
        genders,
        field_error(&p.errors, "gender"),
    )
}

fn render_detail(p: &DetailPage) -> String {
    let c = &p.character;
    let name_or = |name: Option<&str>| html_escape(name.unwrap_or("-"));
    let mut s = format!(
        "<h1>{}</h1>\
<dl><dt>Level</dt><dd>{}</dd>\
<dt>Life</dt><dd>{} / {}</dd>\
<dt>Mana</dt><dd>{} / {}</dd>\
<dt>Offense</dt><dd>{}</dd><dt>Defense</dt><dd>{}</dd>\
<dt>Species</dt><dd>{}</dd><dt>Gender</dt><dd>{}</dd>\
<dt>Location</dt><dd>{}</dd></dl>",
        html_escape(&c.name),
        c.stats.level,
        c.stats.life,
        c.stats.life_max,
        c.stats.mana,
        c.stats.mana_max,
        c.stats.base_offense,
        c.stats.base_defense,
        name_or(p.species.as_ref().map(|s| s.name.as_str())),
        name_or(p.gender.as_ref().map(|g| g.name.as_str())),
        name_or(p.location.as_ref().map(|l| l.name.as_str())),
    );
    if p.in_combat {
        s.push_str("<p class=\"combat\">In combat</p>");
    }
    s.push_str("<h2>Bonuses</h2><table>");
    for (slot, value) in &p.counters {
        s.push_str(&format!(
            "<tr><td id=\"{}\">{}</td><td>{}</td></tr>",
            slot.key(),
            slot.label(),
            value
        ));
    }
    s.push_str("</table>");
    if let Some(notes) = &c.meta.notes {
        s.push_str(&format!("<h2>Notes</h2><p>{}</p>", html_escape(notes)));
    }
    s.push_str(&format!(
        "<p><a href=\"/characters/{}/edit\">Edit</a> | <a href=\"/characters\">Back</a></p>",
        c.id
    ));
    s
}

fn equipment_options(
    items: &[(Item, BaseItem)],
    category: ItemCategory,
    current: &str,
) -> String {
    let mut s = option("", "(nothing)", current.is_empty());
    for (item, base) in items.iter().filter(|(_, base)| base.category == category) {
        let id: ItemId = item.id;
        let id = id.to_string();
        let label = format!("{} ({})", item.name, base.name);
        s.push_str(&option(&id, &label, current == id));
    }
    s
}

fn render_edit(p: &EditPage) -> String {
    let mut genders = option("", "(none)", p.form.gender.is_empty());
    for g in &p.genders {
        let id = g.id.to_string();
        genders.push_str(&option(&id, &g.name, p.form.gender == id));
    }

    let mut slots = String::new();
    for (index, current) in p.form.slot_values().iter().enumerate() {
        let field = format!("slot_{}", index + 1);
        let mut choices = String::new();
        for bonus in SlotBonus::ALL {
            choices.push_str(&option(bonus.key(), bonus.label(), *current == bonus.key()));
        }
        slots.push_str(&format!(
            "<label>Slot {} <select name=\"{}\">{}</select></label>{}",
            index + 1,
            field,
            choices,
            field_error(&p.errors, &field)
        ));
    }

    format!(
        "<h1>Edit {}</h1>\
<form method=\"post\" action=\"/characters/{}/edit\">\
<label>Name <input name=\"name\" value=\"{}\" required></label>{}\
<label>Gender <select name=\"gender\">{}</select></label>{}\
<label>Offense <select name=\"equip_offense\">{}</select></label>{}\
<label>Defense <select name=\"equip_defense\">{}</select></label>{}\
<fieldset><legend>Bonus slots</legend>{}</fieldset>\
<label>Notes <textarea name=\"notes\">{}</textarea></label>{}\
<button type=\"submit\">Save</button></form>\
<p><a href=\"/characters/{}\">Cancel</a></p>",
        html_escape(&p.character.name),
        p.character.id,
        html_escape(&p.form.name),
        field_error(&p.errors, "name"),
        genders,
        field_error(&p.errors, "gender"),
        equipment_options(&p.items, ItemCategory::Offense, &p.form.equip_offense),
        field_error(&p.errors, "equip_offense"),
        equipment_options(&p.items, ItemCategory::Defense, &p.form.equip_defense),
        field_error(&p.errors, "equip_defense"),
        slots,
        html_escape(&p.form.notes),
        field_error(&p.errors, "stats"),
        p.character.id,
    )
}

fn render_inventory(p: &InventoryPage) -> String {
    let mut s = format!(
        "<h1>{}'s {}</h1><p>{} of {} spaces used.</p>",
        html_escape(&p.character.name),
        html_escape(&p.container.name),
        p.container.contents.len(),
        p.container.size
    );
    if p.items.is_empty() {
        s.push_str("<p>Empty.</p>");
        return s;
    }
    if p.compact {
        s.push_str("<ul>");
        for (item, _) in &p.items {
            s.push_str(&format!("<li>{}</li>", html_escape(&item.name)));
        }
        s.push_str("</ul>");
        return s;
    }
    s.push_str(
        "<table><tr><th>Item</th><th>Type</th><th>Category</th><th>Quality</th>\
<th>Power</th><th>Durability</th></tr>",
    );
    for (item, base) in &p.items {
        s.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            html_escape(&item.name),
            html_escape(&base.name),
            base.category.label(),
            base.quality.label(),
            base.power,
            item.durability
        ));
    }
    s.push_str("</table>");
    s
}

fn render_settings(p: &SettingsPage) -> String {
    let mut playing = option("", "(none)", p.form.playing.is_empty());
    for (id, name) in playing_choices(&p.characters) {
        let id = id.to_string();
        playing.push_str(&option(&id, &name, p.form.playing == id));
    }
    format!(
        "<h1>Settings for {}</h1>\
<form method=\"post\" action=\"/settings\">\
<label>Playing <select name=\"playing\">{}</select></label>{}\
<label><input type=\"checkbox\" name=\"compact_inventory\"{}> Compact inventory</label>\
<label>Notes <textarea name=\"notes\">{}</textarea></label>\
<button type=\"submit\">Save</button></form>",
        html_escape(&p.config.username),
        playing,
        field_error(&p.errors, "playing"),
        if p.form.compact_inventory.is_some() {
            " checked"
        } else {
            ""
        },
        html_escape(&p.form.notes),
    )
}
