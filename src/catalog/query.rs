//! Catalog query listing callable routines with their arguments and result columns.
//!
//! Bind parameters:
//! `$1` include schemas, `$2` exclude schemas, `$3` schema SIMILAR TO, `$4` schema NOT SIMILAR TO,
//! `$5` include names, `$6` exclude names, `$7` name SIMILAR TO, `$8` name NOT SIMILAR TO.
//! NULL disables a filter. A custom query must return the same columns.

pub const ROUTINES_QUERY: &str = r#"
select
    n.nspname::text as schema,
    p.proname::text as name,
    p.prokind::text as kind,
    l.lanname::text as language,
    pg_catalog.obj_description(p.oid, 'pg_proc') as comment,
    p.proisstrict as is_strict,
    p.prosecdef as security_definer,
    p.provolatile::text as volatility,
    p.proretset as returns_set,
    pg_catalog.format_type(p.prorettype, null) as return_type,
    t.typtype::text as return_type_kind,
    p.pronargdefaults::int4 as arg_defaults,
    coalesce(args.names, '{}'::text[]) as arg_names,
    coalesce(args.types, '{}'::text[]) as arg_types,
    coalesce(args.modes, '{}'::text[]) as arg_modes,
    coalesce(comp.names, '{}'::text[]) as composite_names,
    coalesce(comp.types, '{}'::text[]) as composite_types
from pg_catalog.pg_proc p
join pg_catalog.pg_namespace n on n.oid = p.pronamespace
join pg_catalog.pg_language l on l.oid = p.prolang
join pg_catalog.pg_type t on t.oid = p.prorettype
left join lateral (
    select
        array_agg(coalesce(nullif(p.proargnames[a.ord::int4], ''), '$' || a.ord) order by a.ord) as names,
        array_agg(pg_catalog.format_type(a.typ, null) order by a.ord) as types,
        array_agg(coalesce(p.proargmodes[a.ord::int4]::text, 'i') order by a.ord) as modes
    from unnest(coalesce(p.proallargtypes, p.proargtypes::oid[])) with ordinality as a(typ, ord)
) args on true
left join lateral (
    select
        array_agg(att.attname::text order by att.attnum) as names,
        array_agg(pg_catalog.format_type(att.atttypid, att.atttypmod) order by att.attnum) as types
    from pg_catalog.pg_attribute att
    where t.typtype = 'c' and att.attrelid = t.typrelid and att.attnum > 0 and not att.attisdropped
) comp on true
where
    n.nspname not in ('pg_catalog', 'information_schema')
    and n.nspname not like 'pg\_toast%'
    and n.nspname not like 'pg\_temp\_%'
    and p.prokind in ('f', 'p')
    and l.lanname not in ('internal', 'c')
    and p.prorettype not in ('pg_catalog.trigger'::regtype, 'pg_catalog.event_trigger'::regtype)
    and ($1::text[] is null or n.nspname::text = any($1))
    and ($2::text[] is null or not (n.nspname::text = any($2)))
    and ($3::text is null or n.nspname::text similar to $3)
    and ($4::text is null or n.nspname::text not similar to $4)
    and ($5::text[] is null or p.proname::text = any($5))
    and ($6::text[] is null or not (p.proname::text = any($6)))
    and ($7::text is null or p.proname::text similar to $7)
    and ($8::text is null or p.proname::text not similar to $8)
order by n.nspname, p.proname, p.oid
"#;
