use crate::protocol::{expect_args, CommandError, OK, READ_ONLY_PROPERTY, UNKNOWN_PROPERTY};

pub type PropertyGetter<D> = fn(&D) -> String;
pub type PropertySetter<D> = fn(&mut D, &str) -> Result<(), CommandError>;

/// Named value exposed through the `*-property` verbs.
pub struct Property<D: 'static> {
    pub name: &'static str,
    pub get: PropertyGetter<D>,
    pub set: Option<PropertySetter<D>>,
}

fn find<D: 'static>(properties: &'static [Property<D>], name: &str) -> Option<&'static Property<D>> {
    properties.iter().find(|p| p.name == name)
}

/// Runs a property verb. `None` means `verb` is not a property verb.
pub(super) fn run<D: 'static>(
    device: &mut D,
    properties: &'static [Property<D>],
    verb: &str,
    args: &[String],
) -> Option<Result<String, CommandError>> {
    let result = match verb {
        "set-property" => set_property(device, properties, args),
        "get-property" => get_property(device, properties, args),
        "list-properties" => expect_args::<0>(args).map(|_| {
            properties
                .iter()
                .map(|p| p.name)
                .collect::<Vec<_>>()
                .join(":")
        }),
        "show-properties" => expect_args::<0>(args).map(|_| {
            properties
                .iter()
                .map(|p| format!("{}={}", p.name, (p.get)(&*device)))
                .collect::<Vec<_>>()
                .join(":")
        }),
        _ => return None,
    };
    Some(result)
}

fn set_property<D: 'static>(
    device: &mut D,
    properties: &'static [Property<D>],
    args: &[String],
) -> Result<String, CommandError> {
    let [name, value] = expect_args::<2>(args)?;
    let Some(property) = find(properties, name) else {
        return Ok(UNKNOWN_PROPERTY.to_string());
    };
    let Some(setter) = property.set else {
        return Ok(READ_ONLY_PROPERTY.to_string());
    };
    setter(device, value)?;
    Ok(OK.to_string())
}

fn get_property<D: 'static>(
    device: &mut D,
    properties: &'static [Property<D>],
    args: &[String],
) -> Result<String, CommandError> {
    let [name] = expect_args::<1>(args)?;
    Ok(find(properties, name).map_or_else(|| UNKNOWN_PROPERTY.to_string(), |p| (p.get)(&*device)))
}
